//! Clients for the hosted model: embeddings, validation calls, and
//! decoding of the model's verdict.

pub mod embeddings;
pub mod evaluator;
pub mod response;

pub use embeddings::{Embedder, HttpEmbedder};
pub use evaluator::{evaluate_with_backoff, Evaluator, HttpEvaluator};
