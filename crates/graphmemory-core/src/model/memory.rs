//! MemoryRecord and its supporting types (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a memory (§3 Lifecycles).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryStatus {
    Pending,
    Complete,
    Superseded,
    Pinned,
    Archived,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Pending => "pending",
            MemoryStatus::Complete => "complete",
            MemoryStatus::Superseded => "Superseded",
            MemoryStatus::Pinned => "Pinned",
            MemoryStatus::Archived => "Archived",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MemoryStatus::Pending),
            "complete" => Some(MemoryStatus::Complete),
            "Superseded" => Some(MemoryStatus::Superseded),
            "Pinned" => Some(MemoryStatus::Pinned),
            "Archived" => Some(MemoryStatus::Archived),
            _ => None,
        }
    }
}

/// Per-memory lifespan class (§3, GLOSSARY).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    Permanent,
    Decision,
    #[default]
    Standard,
    Ephemeral,
    Session,
}

impl RetentionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::Permanent => "permanent",
            RetentionPolicy::Decision => "decision",
            RetentionPolicy::Standard => "standard",
            RetentionPolicy::Ephemeral => "ephemeral",
            RetentionPolicy::Session => "session",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "permanent" => Some(RetentionPolicy::Permanent),
            "decision" => Some(RetentionPolicy::Decision),
            "standard" => Some(RetentionPolicy::Standard),
            "ephemeral" => Some(RetentionPolicy::Ephemeral),
            "session" => Some(RetentionPolicy::Session),
            _ => None,
        }
    }
}

/// A free-form memory submitted by a caller, with extracted graph
/// provenance tracked separately (memory_nodes/memory_edges).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub topic: String,
    pub context: String,
    pub decisions: Vec<String>,
    pub rationale: Vec<String>,
    pub metadata: serde_json::Value,
    pub status: MemoryStatus,
    pub version: u64,
    pub doc_hash: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub access_velocity: f64,
    pub retention_policy: RetentionPolicy,
    pub retention_until: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pin_reason: Option<String>,
    pub superseded_by: Option<String>,
    /// Node ids provenance-linked to this memory (populated by `GetMemory`).
    pub node_ids: Vec<String>,
    /// Edge ids provenance-linked to this memory (populated by `GetMemory`).
    pub edge_ids: Vec<String>,
}

impl MemoryRecord {
    /// Canonical JSON used for `doc_hash` (§3, §4.3 `UpdateMemory`):
    /// topic, context, decisions, rationale only — metadata excluded,
    /// keys sorted, whitespace trimmed.
    pub fn canonical_content_json(
        topic: &str,
        context: &str,
        decisions: &[String],
        rationale: &[String],
    ) -> serde_json::Value {
        serde_json::json!({
            "context": context.trim(),
            "decisions": decisions.iter().map(|d| d.trim().to_string()).collect::<Vec<_>>(),
            "rationale": rationale.iter().map(|r| r.trim().to_string()).collect::<Vec<_>>(),
            "topic": topic.trim(),
        })
    }

    pub fn compute_doc_hash(
        topic: &str,
        context: &str,
        decisions: &[String],
        rationale: &[String],
    ) -> String {
        let value = Self::canonical_content_json(topic, context, decisions, rationale);
        crate::ids::hash_canonical_json(&value)
    }

    /// Recompute `access_velocity = access_count / max(1, days_since_creation)` (§4.3).
    pub fn recompute_access_velocity(&mut self, now: DateTime<Utc>) {
        let days = (now - self.created_at).num_seconds() as f64 / 86_400.0;
        let days = days.max(1.0);
        self.access_velocity = self.access_count as f64 / days;
    }
}

/// Lightweight listing projection of [`MemoryRecord`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySummary {
    pub id: String,
    pub topic: String,
    pub status: MemoryStatus,
    pub retention_policy: RetentionPolicy,
    pub pinned: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl From<&MemoryRecord> for MemorySummary {
    fn from(m: &MemoryRecord) -> Self {
        Self {
            id: m.id.clone(),
            topic: m.topic.clone(),
            status: m.status,
            retention_policy: m.retention_policy,
            pinned: m.pinned,
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
            last_accessed_at: m.last_accessed_at,
        }
    }
}

/// Filters accepted by `ListMemories` (§4.3).
#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    pub status: Option<MemoryStatus>,
    pub retention_policy: Option<RetentionPolicy>,
    pub pinned: Option<bool>,
}

/// Ordering for `ListMemories`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    CreatedAtDesc,
    UpdatedAtDesc,
    LastAccessedAtDesc,
}

impl Default for MemoryOrder {
    fn default() -> Self {
        MemoryOrder::UpdatedAtDesc
    }
}

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 100;
