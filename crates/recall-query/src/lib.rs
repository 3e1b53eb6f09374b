//! recall-query - Multi-query hybrid search and rank-fusion engine
//!
//! This crate turns one user query into a set of diverse reformulations,
//! runs semantic and lexical search for each against the archive backends,
//! and fuses all ranked lists into one deduplicated result set using
//! Reciprocal Rank Fusion (RRF).
//!
//! # Features
//!
//! - Query expansion with modality-targeted variants
//! - Hybrid search (semantic + lexical), failures isolated per sub-search
//! - Rank fusion over ranks, not raw scores
//! - Bounded concurrent fan-out with an overall deadline and partial results
//!
//! # Example
//!
//! ```rust,ignore
//! use recall_query::RetrievalEngine;
//! use recall_core::RecallConfig;
//! use std::sync::Arc;
//!
//! let engine = RetrievalEngine::new(
//!     Arc::new(generator),
//!     Arc::new(vector_index),
//!     Arc::new(lexical_index),
//!     Arc::new(archive),
//!     RecallConfig::default(),
//! );
//! let (results, stats) = engine.retrieve("team offsite photos").await?;
//! ```

mod engine;
mod expand;
mod fusion;
mod hybrid;
mod select;

pub use engine::RetrievalEngine;
pub use expand::QueryExpander;
pub use fusion::fuse;
pub use hybrid::{HybridSearcher, VariantLists};
pub use select::select;

// Re-export for convenience
pub use recall_core::{FusedResult, RetrievalStats, RetrievedRecord};
