//! LLM client consumer contract (§6.3) and extraction schema types.

use serde::{Deserialize, Serialize};

use crate::error::LlmClientError;
use crate::model::NodeType;

/// Which extraction shape a `complete_with_schema` call is requesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTarget {
    /// Entities and relation triplets in one combined response.
    Combined,
    /// Entities only.
    Entities,
    /// Relation triplets only, given an already-known entity set.
    Triplets,
}

/// Produces structured JSON from a prompt, validated against `target`'s
/// expected shape. No network-calling implementation ships in this crate
/// (out of scope per §1) — hosts bring their own.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete_with_schema(
        &self,
        prompt: &str,
        target: SchemaTarget,
    ) -> Result<serde_json::Value, LlmClientError>;
}

/// An entity as extracted by the LLM, before deterministic id assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub description: String,
}

/// A subject-relation-object triplet as extracted by the LLM, referencing
/// entities by name rather than by (not-yet-assigned) node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedTriplet {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

/// The parsed result of a `SchemaTarget::Combined` extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub triplets: Vec<ExtractedTriplet>,
}

/// Normalise a raw LLM JSON response into an [`ExtractionResult`] (§6.3):
/// strips Markdown fenced-code-block wrapping LLMs commonly add around
/// JSON, and flattens any field an LLM mistakenly emitted as a string
/// array (e.g. `"description": ["a", "b"]`) by joining with ", ".
pub fn normalize_extraction_response(raw: &str) -> Result<ExtractionResult, LlmClientError> {
    let stripped = strip_code_fence(raw);
    let mut value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| LlmClientError::InvalidJson(e.to_string()))?;

    flatten_string_arrays(&mut value);

    serde_json::from_value(value).map_err(|e| LlmClientError::SchemaMismatch(e.to_string()))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line (e.g. ```json).
    let after_open = after_open
        .find('\n')
        .map(|i| &after_open[i + 1..])
        .unwrap_or(after_open);
    after_open.strip_suffix("```").unwrap_or(after_open).trim()
}

/// Recursively join any JSON array of strings into a single comma-joined
/// string, in place. Arrays of non-strings and all other shapes pass through.
fn flatten_string_arrays(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Array(items) => {
            let all_strings = !items.is_empty()
                && items.iter().all(|v| matches!(v, serde_json::Value::String(_)));
            if all_strings {
                let joined = items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                *value = serde_json::Value::String(joined);
            } else {
                for item in items {
                    flatten_string_arrays(item);
                }
            }
        }
        serde_json::Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                flatten_string_arrays(v);
            }
        }
        _ => {}
    }
}

/// Parse a node type string from extraction output, defaulting unknown
/// tags to [`NodeType::Concept`] (§3 invariant — mirrors `NodeType::parse_name`).
pub fn parse_extracted_node_type(raw: &str) -> (NodeType, bool) {
    NodeType::parse_name(raw)
}
