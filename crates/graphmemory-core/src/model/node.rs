//! Node — an extracted entity in the knowledge graph (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed vocabulary of node types (§3). Unknown type strings normalise
/// to [`NodeType::Concept`] with a `tracing::warn!`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum NodeType {
    Person,
    #[default]
    Concept,
    System,
    Decision,
    Event,
    Technology,
    Pattern,
    Problem,
    Goal,
    Location,
    Organization,
    Document,
    Process,
    Requirement,
    Feature,
    Task,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Person => "Person",
            NodeType::Concept => "Concept",
            NodeType::System => "System",
            NodeType::Decision => "Decision",
            NodeType::Event => "Event",
            NodeType::Technology => "Technology",
            NodeType::Pattern => "Pattern",
            NodeType::Problem => "Problem",
            NodeType::Goal => "Goal",
            NodeType::Location => "Location",
            NodeType::Organization => "Organization",
            NodeType::Document => "Document",
            NodeType::Process => "Process",
            NodeType::Requirement => "Requirement",
            NodeType::Feature => "Feature",
            NodeType::Task => "Task",
        }
    }

    /// Parse a type string from LLM extraction output, normalising unknown
    /// tags to `Concept` (§3 invariant, §9 "tagged variants" design note).
    /// Returns whether the input was recognised so the caller can emit a
    /// warning exactly once per extraction, not per call.
    pub fn parse_name(s: &str) -> (Self, bool) {
        match s.trim() {
            "Person" => (NodeType::Person, true),
            "Concept" => (NodeType::Concept, true),
            "System" => (NodeType::System, true),
            "Decision" => (NodeType::Decision, true),
            "Event" => (NodeType::Event, true),
            "Technology" => (NodeType::Technology, true),
            "Pattern" => (NodeType::Pattern, true),
            "Problem" => (NodeType::Problem, true),
            "Goal" => (NodeType::Goal, true),
            "Location" => (NodeType::Location, true),
            "Organization" => (NodeType::Organization, true),
            "Document" => (NodeType::Document, true),
            "Process" => (NodeType::Process, true),
            "Requirement" => (NodeType::Requirement, true),
            "Feature" => (NodeType::Feature, true),
            "Task" => (NodeType::Task, true),
            _ => (NodeType::Concept, false),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the knowledge graph: a deduplicated entity extracted from one
/// or more memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Deterministic id: `truncate16(sha256(normalize(name) + "|" + type))`.
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub description: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub metadata: serde_json::Value,
}

impl Node {
    pub fn new(id: String, name: String, node_type: NodeType, description: String) -> Self {
        Self {
            id,
            name,
            node_type,
            description,
            embedding: None,
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Text used to build the embedding input batch (§4.4 Phase 2):
    /// `name + " " + description`.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.name, self.description)
    }
}
