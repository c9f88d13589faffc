//! Deterministic id derivation (§3 invariant 1, §4.4.1).
//!
//! Node identity is content-derived so re-processing the same entity
//! converges on the same row instead of duplicating it. Edge identity is
//! derived from its resolved endpoint ids plus relation label so the same
//! triplet re-extracted from a different chunk upserts in place.

use sha2::{Digest, Sha256};

/// Lowercase, trim, and collapse internal whitespace runs to a single space.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    out
}

fn truncate16_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..16]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
}

/// `truncate16(sha256(lowercase(collapse_ws(trim(name))) + "|" + type))`,
/// hex-encoded (§3 invariant 1).
pub fn generate_deterministic_node_id(name: &str, node_type: &str) -> String {
    let normalized = normalize_name(name);
    truncate16_hex(&format!("{normalized}|{node_type}"))
}

/// `sha256(source-id|relation|target-id)`, hex-encoded (§4.4 Phase 3).
pub fn generate_deterministic_edge_id(source_id: &str, relation: &str, target_id: &str) -> String {
    let digest = Sha256::digest(format!("{source_id}|{relation}|{target_id}").as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 over canonical JSON, used as `MemoryRecord.doc_hash` (§3, GLOSSARY).
///
/// "Canonical" here means: a `serde_json::Value` built by the caller with
/// keys already sorted and string fields trimmed, then serialized. This
/// function itself is a thin wrapper so the hashing step is visible and
/// testable independent of how the caller assembles the value.
pub fn hash_canonical_json(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).expect("serde_json::Value always serializes");
    let digest = Sha256::digest(&bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
