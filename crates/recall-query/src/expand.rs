//! Query expansion into diverse reformulations.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use recall_core::{QueryVariant, VariantGenerator, VariantKind};

/// Expands one user query into an ordered, duplicate-free set of variants.
///
/// The original query is always the first variant, so retrieval never does
/// worse than a naive single-query search. Remaining variants come from the
/// external text generator; if it fails or produces nothing usable the
/// expander silently degrades to single-query mode.
pub struct QueryExpander<G> {
    /// Text-generation collaborator.
    generator: Arc<G>,

    /// Prompt template with a `{query}` placeholder. Immutable per engine.
    template: String,
}

impl<G> QueryExpander<G>
where
    G: VariantGenerator,
{
    /// Create a new expander.
    pub fn new(generator: Arc<G>, template: impl Into<String>) -> Self {
        Self {
            generator,
            template: template.into(),
        }
    }

    /// Expand `query` into at most `max_variants` variants.
    ///
    /// Never fails: generator errors degrade to the original query alone.
    pub async fn expand(&self, query: &str, max_variants: usize) -> Vec<QueryVariant> {
        let original = QueryVariant::new(query, VariantKind::Original);
        if max_variants <= 1 {
            return vec![original];
        }

        let prompt = self.template.replace("{query}", query);
        let lines = match self.generator.generate(&prompt).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Variant generation failed, using original query only: {}", e);
                return vec![original];
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(normalize(query));

        let mut variants = vec![original];
        for line in lines {
            if variants.len() >= max_variants {
                break;
            }
            let Some((kind, text)) = parse_line(&line) else {
                continue;
            };
            if !seen.insert(normalize(&text)) {
                continue;
            }
            variants.push(QueryVariant::new(text, kind));
        }

        if variants.len() == 1 {
            warn!("Variant generator produced no usable lines, using original query only");
        } else {
            debug!("Expanded query into {} variants", variants.len());
        }

        variants
    }
}

/// Normalized form used for duplicate detection.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse one generator output line into a kind and variant text.
///
/// Lines follow `tag: text`; unknown tags and untagged lines are kept as
/// paraphrases so a sloppy generator still contributes recall. Returns
/// `None` for blank lines.
fn parse_line(line: &str) -> Option<(VariantKind, String)> {
    let line = line
        .trim()
        .trim_start_matches(['-', '*'])
        .trim();
    if line.is_empty() {
        return None;
    }

    if let Some((tag, rest)) = line.split_once(':') {
        let kind = match tag.trim().to_lowercase().as_str() {
            "expanded" => Some(VariantKind::Expanded),
            "decomposed" => Some(VariantKind::Decomposed),
            "paraphrase" => Some(VariantKind::Paraphrase),
            "image" | "image-focused" => Some(VariantKind::ImageFocused),
            "video" | "video-focused" => Some(VariantKind::VideoFocused),
            "audio" | "audio-focused" => Some(VariantKind::AudioFocused),
            "entity-temporal" | "entity" | "temporal" => Some(VariantKind::EntityTemporal),
            _ => None,
        };
        if let Some(kind) = kind {
            let text = rest.trim();
            if text.is_empty() {
                return None;
            }
            return Some((kind, text.to_string()));
        }
    }

    Some((VariantKind::Paraphrase, line.to_string()))
}
