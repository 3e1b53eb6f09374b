//! Core domain types for the retrieval system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Content modality of an archive record.
///
/// Non-text modalities are searchable through a machine-generated
/// description or transcript stored in the record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Video,
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        };
        write!(f, "{}", s)
    }
}

/// An immutable entry in the conversational archive.
///
/// The archive is append-only; `id` is stable across reindexing and
/// `modality` never changes once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Creation timestamp (Unix millis).
    pub timestamp: u64,

    /// Channel or source group the record came from.
    pub channel: String,

    /// Author of the record.
    pub author: String,

    /// Content modality.
    pub modality: Modality,

    /// Searchable text surface. For image/video/audio records this is the
    /// generated description or transcript, not the raw content.
    pub body: String,

    /// Opaque reference to the raw content (not interpreted here).
    pub content_ref: Option<String>,

    /// Blake3 hash of the body for deduplication.
    #[serde(with = "serde_bytes_opt")]
    pub content_hash: Option<[u8; 32]>,
}

impl Record {
    /// Create a new record.
    pub fn new(channel: &str, author: &str, modality: Modality, body: &str) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let content_hash = blake3::hash(body.as_bytes());

        Self {
            id: Ulid::new(),
            timestamp: now,
            channel: channel.to_string(),
            author: author.to_string(),
            modality,
            body: body.to_string(),
            content_ref: None,
            content_hash: Some(*content_hash.as_bytes()),
        }
    }
}

/// The reformulation strategy that produced a query variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// The user's query, verbatim.
    Original,
    /// Broadened scope.
    Expanded,
    /// One sub-aspect of the query.
    Decomposed,
    /// Same intent, different wording.
    Paraphrase,
    /// Biased toward image-description vocabulary.
    ImageFocused,
    /// Biased toward video-description vocabulary.
    VideoFocused,
    /// Biased toward transcript vocabulary.
    AudioFocused,
    /// Pulls out named entities and time references.
    EntityTemporal,
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Original => "original",
            Self::Expanded => "expanded",
            Self::Decomposed => "decomposed",
            Self::Paraphrase => "paraphrase",
            Self::ImageFocused => "image-focused",
            Self::VideoFocused => "video-focused",
            Self::AudioFocused => "audio-focused",
            Self::EntityTemporal => "entity-temporal",
        };
        write!(f, "{}", s)
    }
}

/// A generated reformulation of the user query.
///
/// Created per request, consumed immediately, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryVariant {
    /// Variant text sent to both search backends.
    pub text: String,

    /// Which reformulation strategy produced it.
    pub kind: VariantKind,
}

impl QueryVariant {
    pub fn new(text: impl Into<String>, kind: VariantKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Which search backend produced a ranked hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Semantic,
    Lexical,
}

/// One entry in a per-method, per-variant result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    /// The matched record.
    pub record_id: Ulid,

    /// 1-based position in the producing list. Gapless, no ties.
    pub rank: u32,

    /// Which backend produced the hit.
    pub method: SearchMethod,

    /// Which query variant produced the hit.
    pub variant_kind: VariantKind,
}

/// A record after rank fusion, scored across all contributing lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// The record.
    pub record_id: Ulid,

    /// Summed reciprocal-rank score (higher is better).
    pub score: f64,

    /// Number of ranked lists the record appeared in. Explainability
    /// only; scoring uses ranks, not this count.
    pub contributing_lists: u32,
}

/// A fused result hydrated with its archive record, for the synthesis layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedRecord {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Fused relevance score.
    pub score: f64,

    /// The archive record.
    pub record: Record,
}

/// Statistics for one retrieval request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalStats {
    /// Query variants actually searched (1 when expansion degraded).
    pub variant_count: usize,

    /// Sum of all sub-search list lengths before dedup.
    pub raw_hits: usize,

    /// Unique records surfaced across all lists.
    pub unique_records: usize,

    /// Sub-searches that failed or timed out.
    pub failed_searches: usize,

    /// Modality breakdown of the final selection.
    pub modality_counts: HashMap<Modality, usize>,

    /// Retrieval latency in milliseconds.
    pub latency_ms: u64,
}

/// Helper module for optional byte array serialization.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let hex = hex::encode(bytes);
                hex.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(hex) => {
                let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("invalid hash length"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}
