//! Core traits defining the interfaces to external collaborators.
//!
//! The retrieval core treats the text generator, both search backends, and
//! the archive as black boxes. Everything behind these traits may block or
//! await I/O; everything in front of them is pure computation.

use async_trait::async_trait;
use ulid::Ulid;

use crate::error::Result;
use crate::types::{Modality, Record};

/// Text-generation collaborator used for query expansion.
#[async_trait]
pub trait VariantGenerator: Send + Sync {
    /// Generate reformulation candidates for the given prompt.
    ///
    /// Each returned string is one candidate variant line. Errors and empty
    /// output are tolerated by the caller, which falls back to the original
    /// query alone.
    async fn generate(&self, prompt: &str) -> Result<Vec<String>>;
}

/// Embedding-similarity search over the archive index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return up to `k` record ids by embedding similarity, best first.
    async fn similarity_search(&self, query: &str, k: u32) -> Result<Vec<Ulid>>;
}

/// Term-weighted lexical search over the archive index.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    /// Return up to `k` record ids by keyword relevance, best first.
    async fn keyword_search(&self, query: &str, k: u32) -> Result<Vec<Ulid>>;
}

/// Read-only metadata and content lookup against the archive.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Look up the modality of a record. `None` if the id is unknown.
    async fn get_modality(&self, id: Ulid) -> Result<Option<Modality>>;

    /// Fetch a full record for hydration. `None` if the id is unknown.
    async fn get_record(&self, id: Ulid) -> Result<Option<Record>>;
}
