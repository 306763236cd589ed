//! Retrieval core: similarity search, authority re-ranking, the compliance
//! pre-score and prompt assembly.

pub mod authority;
pub mod compliance;
pub mod engine;
pub mod prompt;

pub use authority::AuthorityLabels;
pub use compliance::estimate_compliance;
pub use engine::RetrievalEngine;
