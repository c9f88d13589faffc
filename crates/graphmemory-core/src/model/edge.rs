//! Edge — a direction-agnostic relation between two nodes (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed relation between two nodes. Discovery is direction-agnostic
/// (§3): `source_node_id`/`target_node_id` record extraction order, but
/// traversal treats edges as undirected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Deterministic id: `sha256(source_id|relation|target_id)`.
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    /// Upper-snake-case relation label, e.g. `"USES"`.
    pub relation: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(id: String, source_node_id: String, target_node_id: String, relation: String) -> Self {
        Self {
            id,
            source_node_id,
            target_node_id,
            relation,
            weight: 1.0,
            created_at: Utc::now(),
        }
    }

    /// The other endpoint given one known endpoint, or `None` if `node_id`
    /// is not one of this edge's endpoints.
    pub fn other_endpoint(&self, node_id: &str) -> Option<&str> {
        if self.source_node_id == node_id {
            Some(&self.target_node_id)
        } else if self.target_node_id == node_id {
            Some(&self.source_node_id)
        } else {
            None
        }
    }
}

/// Normalise a relation label to upper-snake-case, e.g. `"uses for"` -> `"USES_FOR"`.
pub fn normalize_relation(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_endpoint_resolves_either_direction() {
        let edge = Edge::new("e1".into(), "a".into(), "b".into(), "USES".into());
        assert_eq!(edge.other_endpoint("a"), Some("b"));
        assert_eq!(edge.other_endpoint("b"), Some("a"));
        assert_eq!(edge.other_endpoint("c"), None);
    }

    #[test]
    fn normalize_relation_upper_snake_cases() {
        assert_eq!(normalize_relation("uses for"), "USES_FOR");
        assert_eq!(normalize_relation("depends-on"), "DEPENDS_ON");
        assert_eq!(normalize_relation("CREATED_BY"), "CREATED_BY");
    }
}
