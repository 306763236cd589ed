//! # rule-validator
//!
//! Retrieval-augmented validation of Python detection rules. Guideline
//! documents and reference examples are embedded into a vector store; a
//! submitted rule is embedded once and used to pull the most relevant
//! material, which is re-ranked by authority and assembled into the prompt
//! sent to the evaluating model.
//!
//! ## Context pipeline
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  Rule code   │
//!                      └──────┬───────┘
//!                             │ preprocess + embed (once)
//!          ┌──────────────────┼──────────────────┐
//!          ▼                  ▼                  ▼
//!  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//!  │ Weighted docs │  │ Keyword-gated │  │   Examples    │
//!  │ top 3, ≥0.75  │  │ top 2, ≥0.5   │  │ top 2, ≥0.6   │
//!  │ ×1.3/1.2/1.1  │  │ best-effort   │  │               │
//!  └───────┬───────┘  └───────┬───────┘  └───────┬───────┘
//!          └─────────┬────────┘                  │
//!                    ▼                           │
//!          ┌───────────────────┐                 │
//!          │ Merge, dedup by id│                 │
//!          │ cap 5             │                 │
//!          └─────────┬─────────┘                 │
//!                    ▼                           │
//!          ┌───────────────────┐                 │
//!          │ Compliance score  │                 │
//!          └─────────┬─────────┘                 │
//!                    └─────────────┬─────────────┘
//!                                  ▼
//!                      ┌───────────────────────┐
//!                      │   Prompt assembly     │
//!                      └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, LLM, retrieval and ingestion
//! - [`models`] - Records, search results, the validation report and request types
//! - [`error`] - Typed errors for embedding, retrieval, evaluation and decoding
//! - [`store`] - `VectorStore` trait, typed nearest-neighbour queries, in-memory store with JSON persistence
//! - [`llm::embeddings`] - Text preprocessing and embedding via Ollama or OpenAI-compatible APIs
//! - [`llm::evaluator`] - Validation calls with rate-limit backoff
//! - [`llm::response`] - JSON extraction and report decoding
//! - [`search`] - Retrieval engine, authority weighting, compliance pre-score, prompt assembly
//! - [`chunking`] - Paragraph-packing text chunker used at ingestion
//! - [`ingest`] - Document ingestion and record edits that keep embeddings current
//! - [`validate`] - The validation pipeline with provenance
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
pub mod validate;
