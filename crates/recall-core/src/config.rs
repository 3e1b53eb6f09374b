//! Configuration types for the retrieval system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default expansion prompt. `{query}` is replaced with the user query.
///
/// The tag vocabulary must line up with the parser in the query crate:
/// unrecognized tags are kept as paraphrases rather than dropped.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You rewrite a search query into diverse reformulations for retrieval over a \
chat archive that also contains generated image descriptions, video \
descriptions with transcripts, and audio transcripts.

Produce one reformulation per line in the form `tag: text`, using these tags:
- expanded: broaden the scope of the query
- decomposed: isolate one sub-aspect of the query
- paraphrase: same intent, different wording
- image: bias toward image-description vocabulary (shows, depicts, pictured)
- video: bias toward video-description vocabulary (clip, scene, recorded)
- audio: bias toward transcript vocabulary (said, mentioned, discussed)
- entity-temporal: names, places, and time references from the query

Do not repeat the original query. Output only the tagged lines.

Query: {query}";

/// Main configuration for the retrieval system.
///
/// Injected into the engine at construction and treated as immutable for
/// the engine's lifetime; no process-wide mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Query expansion configuration.
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Search and fusion configuration.
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            expansion: ExpansionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Query expansion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Maximum query variants per request, original included.
    #[serde(default = "default_max_variants")]
    pub max_variants: usize,

    /// Prompt template for the variant generator. Must contain `{query}`.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_variants: 6,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Search and fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results fetched per method per variant.
    #[serde(default = "default_per_method_k")]
    pub per_method_k: u32,

    /// Final result count after fusion and selection.
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,

    /// RRF damping constant k.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Maximum in-flight variant searches.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Overall retrieval deadline in milliseconds. On expiry, fusion runs
    /// over whatever sub-searches have completed.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_method_k: 20,
            final_limit: 10,
            rrf_k: 60,
            max_concurrency: 4,
            timeout_ms: 10_000,
        }
    }
}

// Default value functions

fn default_max_variants() -> usize {
    6
}

fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}

fn default_per_method_k() -> u32 {
    20
}

fn default_final_limit() -> usize {
    10
}

fn default_rrf_k() -> u32 {
    60
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl RecallConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::RecallError::Config {
                message: format!("Failed to parse config: {}", e),
            }
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("recall").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("recall.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }
}
