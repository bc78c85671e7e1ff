//! Shaikh - hybrid retrieval over Quranic commentary
//!
//! Given up to three decomposed sub-queries with optional facet filters
//! (content type, source, surah, ayah), runs filtered semantic and lexical
//! search for each concurrently and merges the results with Reciprocal Rank
//! Fusion. See [`retrieval::HybridSearcher`].

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod metadata;
pub mod retrieval;
pub mod store;
pub mod text;

pub use error::{Result, ShaikhError};
