//! `Prune` (§4.6): removes aged-out and superseded memories along with any
//! graph provenance that becomes unreferenced as a result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::DecayConfig;
use crate::error::EngineError;
use crate::graph_store::GraphStore;
use crate::memory_store::MemoryStore;
use crate::model::{MemoryStatus, RetentionPolicy};
use crate::search::{age_days, has_protective_provenance, heat_multiplier, time_factor};
use crate::vector_store::VectorStore;

/// Options accepted by `Prune` (§4.6).
#[derive(Debug, Clone)]
pub struct PruneOptions {
    pub max_age_days: Option<f64>,
    pub min_decay_score: Option<f64>,
    pub prune_superseded: bool,
    pub superseded_age_days: f64,
    pub dry_run: bool,
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            max_age_days: None,
            min_decay_score: None,
            prune_superseded: true,
            superseded_age_days: 30.0,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneResult {
    pub nodes_evaluated: u64,
    pub nodes_pruned: u64,
    pub edges_pruned: u64,
    pub memories_evaluated: u64,
    pub memories_pruned: u64,
    pub superseded_memories_pruned: u64,
    pub pruned_by_policy: HashMap<String, u64>,
    pub duration_ms: i64,
}

/// `list_memories` caps a single page at `MAX_LIST_LIMIT`; prune needs the
/// whole table, so page through it.
fn list_all_memories(memory: &Arc<MemoryStore>) -> Result<Vec<crate::model::MemoryRecord>, EngineError> {
    use crate::model::MAX_LIST_LIMIT;

    let mut out = Vec::new();
    let mut offset = 0;
    loop {
        let page = memory.list_memories(
            offset,
            MAX_LIST_LIMIT,
            &Default::default(),
            crate::model::MemoryOrder::UpdatedAtDesc,
        )?;
        let len = page.len();
        out.extend(page);
        if len < MAX_LIST_LIMIT {
            break;
        }
        offset += MAX_LIST_LIMIT;
    }
    Ok(out)
}

/// Run `Prune` against the shared stores (§4.6 steps 1-6).
pub fn prune(
    graph: &Arc<GraphStore>,
    memory: &Arc<MemoryStore>,
    vectors: &Arc<dyn VectorStore>,
    decay: &DecayConfig,
    options: &PruneOptions,
) -> Result<PruneResult, EngineError> {
    let started = Utc::now();
    let mut result = PruneResult::default();

    let all_memories = list_all_memories(memory)?;
    result.memories_evaluated = all_memories.len() as u64;

    let now = Utc::now();
    let mut memories_to_delete = Vec::new();

    for record in &all_memories {
        if record.pinned || record.retention_policy == RetentionPolicy::Permanent {
            continue;
        }
        if options.prune_superseded
            && record.status == MemoryStatus::Superseded
            && (now - record.updated_at).num_seconds() as f64 / 86_400.0
                >= options.superseded_age_days
        {
            memories_to_delete.push(record.id.clone());
            *result
                .pruned_by_policy
                .entry("superseded".to_string())
                .or_insert(0) += 1;
        }
    }
    result.superseded_memories_pruned = memories_to_delete.len() as u64;

    let all_nodes = graph.get_all_nodes()?;
    result.nodes_evaluated = all_nodes.len() as u64;

    // A node with zero provenance rows at the start of this run is never a
    // GC candidate (Testable property 7 "legacy immunity") — only nodes
    // that were provenance-tracked before deletions run can become orphans.
    let mut provenance_tracked: std::collections::HashSet<String> = std::collections::HashSet::new();

    let mut nodes_to_delete = Vec::new();
    for node in &all_nodes {
        let linked = memory.get_memories_by_node_ids(std::slice::from_ref(&node.id))?;
        let linked_ids = linked.get(&node.id).cloned().unwrap_or_default();
        if linked_ids.is_empty() {
            // Zero provenance rows: immune to age/decay-score eviction too,
            // not just the orphan recheck below (Testable property 7).
            continue;
        }
        provenance_tracked.insert(node.id.clone());
        let mut linked_memories = Vec::with_capacity(linked_ids.len());
        for id in &linked_ids {
            if let Some(m) = memory.get_memory(id)? {
                linked_memories.push(m);
            }
        }
        if has_protective_provenance(&linked_memories) {
            continue;
        }

        let age = age_days(now, node.created_at);
        let exceeds_age = options.max_age_days.map(|max| age > max).unwrap_or(false);

        let decay_multiplier = {
            let factor = time_factor(age, decay.half_life_days);
            let heat = if decay.heat_multiplier_enabled {
                heat_multiplier(node.access_count, decay.heat_reference_count)
            } else {
                1.0
            };
            factor * (0.5 + 0.5 * heat)
        };
        let below_min_score = options
            .min_decay_score
            .map(|min| decay_multiplier < min)
            .unwrap_or(false);

        if exceeds_age || below_min_score {
            nodes_to_delete.push(node.id.clone());
            *result
                .pruned_by_policy
                .entry("decay".to_string())
                .or_insert(0) += 1;
        }
    }

    result.memories_pruned = memories_to_delete.len() as u64;

    // `nodes_to_delete` only flags age/decay candidates for the policy
    // counter above; it is NOT the final deletion set. A node can be aged
    // or below the decay-score floor and still be actively referenced by a
    // live `Standard`-policy memory, so the actual deletion set is decided
    // below, after the memory-delete cascade, purely by post-cascade
    // refcount (§4.6 step 5).
    let decay_flagged: std::collections::HashSet<String> = nodes_to_delete.into_iter().collect();

    if options.dry_run {
        result.nodes_pruned = decay_flagged.len() as u64;
        result.duration_ms = (Utc::now() - started).num_milliseconds();
        return Ok(result);
    }

    let mut vector_removals: Vec<String> = Vec::new();

    memory.with_transaction::<(), EngineError>(|conn| {
        for memory_id in &memories_to_delete {
            MemoryStore::delete_memory_stmt(conn, memory_id)?;
        }

        // Re-check every provenance-tracked node's refcount from inside the
        // same transaction that just cascaded the memory deletions above.
        // A node only belongs in the final deletion set once its refcount
        // has actually dropped to zero here — being decay/age-flagged is
        // never sufficient on its own (Testable property 5/6).
        let mut orphan_candidates: std::collections::HashSet<String> =
            std::collections::HashSet::new();
        for node in &all_nodes {
            if !provenance_tracked.contains(&node.id) {
                continue;
            }
            if MemoryStore::count_memory_references_stmt(conn, &node.id)? == 0 {
                orphan_candidates.insert(node.id.clone());
            }
        }

        for node_id in &orphan_candidates {
            for edge in GraphStore::get_edges_stmt(conn, node_id)? {
                GraphStore::delete_edge_stmt(conn, &edge.id)?;
                result.edges_pruned += 1;
            }
            GraphStore::delete_node_stmt(conn, node_id)?;
            vector_removals.push(node_id.clone());
            result.nodes_pruned += 1;
        }

        Ok(())
    })?;

    for node_id in &vector_removals {
        vectors.remove(node_id)?;
    }

    result.duration_ms = (Utc::now() - started).num_milliseconds();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryRecord, Node, NodeType};
    use crate::vector_store::InMemoryVectorStore;
    use chrono::Duration;

    fn sample_memory(id: &str, status: MemoryStatus, updated_at: chrono::DateTime<Utc>) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord {
            id: id.to_string(),
            topic: "t".to_string(),
            context: "c".to_string(),
            decisions: vec![],
            rationale: vec![],
            metadata: serde_json::json!({}),
            status,
            version: 1,
            doc_hash: MemoryRecord::compute_doc_hash("t", "c", &[], &[]),
            source: "test".to_string(),
            created_at: now - Duration::days(60),
            updated_at,
            last_accessed_at: None,
            access_count: 0,
            access_velocity: 0.0,
            retention_policy: RetentionPolicy::Standard,
            retention_until: None,
            pinned: false,
            pinned_at: None,
            pin_reason: None,
            superseded_by: None,
            node_ids: vec![],
            edge_ids: vec![],
        }
    }

    #[test]
    fn prunes_superseded_memory_past_grace_period() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let old_update = Utc::now() - Duration::days(60);
        memory
            .add_memory(&sample_memory("m1", MemoryStatus::Superseded, old_update))
            .unwrap();

        let options = PruneOptions::default();
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        assert_eq!(result.superseded_memories_pruned, 1);
        assert!(memory.get_memory("m1").unwrap().is_none());
    }

    #[test]
    fn dry_run_does_not_delete() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let old_update = Utc::now() - Duration::days(60);
        memory
            .add_memory(&sample_memory("m1", MemoryStatus::Superseded, old_update))
            .unwrap();

        let options = PruneOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        assert_eq!(result.memories_pruned, 1);
        assert!(memory.get_memory("m1").unwrap().is_some());
    }

    #[test]
    fn pinned_memory_is_exempt() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let old_update = Utc::now() - Duration::days(60);
        let mut record = sample_memory("m1", MemoryStatus::Superseded, old_update);
        record.pinned = true;
        memory.add_memory(&record).unwrap();

        let options = PruneOptions::default();
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        assert_eq!(result.superseded_memories_pruned, 0);
        assert!(memory.get_memory("m1").unwrap().is_some());
    }

    #[test]
    fn orphaned_node_is_pruned_after_its_only_memory_is_deleted() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let old_update = Utc::now() - Duration::days(60);
        memory
            .add_memory(&sample_memory("m1", MemoryStatus::Superseded, old_update))
            .unwrap();
        let node = Node::new("n1".into(), "Orphan".into(), NodeType::Concept, "".into());
        graph.add_node(&node).unwrap();
        memory.link_node("m1", "n1", Utc::now()).unwrap();

        let options = PruneOptions::default();
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        assert_eq!(result.nodes_pruned, 1);
        assert!(graph.get_node("n1").unwrap().is_none());
    }

    #[test]
    fn node_with_no_provenance_is_never_pruned() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let node = Node::new("legacy".into(), "Legacy".into(), NodeType::Concept, "".into());
        graph.add_node(&node).unwrap();

        let options = PruneOptions::default();
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        assert_eq!(result.nodes_pruned, 0);
        assert!(graph.get_node("legacy").unwrap().is_some());
    }

    #[test]
    fn aged_node_still_referenced_by_live_memory_survives_prune() {
        let graph = Arc::new(GraphStore::open(None).unwrap());
        let memory = Arc::new(MemoryStore::new(graph.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());

        let now = Utc::now();
        let mut node = Node::new("n1".into(), "Aged".into(), NodeType::Concept, "".into());
        node.created_at = now - Duration::days(90);
        graph.add_node(&node).unwrap();

        // Complete, Standard-policy, not superseded: nothing about this
        // memory makes it a prune candidate, so its link to "n1" survives
        // the memory-delete phase untouched.
        memory
            .add_memory(&sample_memory("m1", MemoryStatus::Complete, now))
            .unwrap();
        memory.link_node("m1", "n1", now).unwrap();

        let options = PruneOptions {
            max_age_days: Some(30.0),
            prune_superseded: false,
            ..Default::default()
        };
        let result = prune(&graph, &memory, &vectors, &DecayConfig::default(), &options).unwrap();

        // "n1" is flagged by age (90 days > 30-day max) but its refcount is
        // still 1 after the memory-delete cascade, so it must not be
        // collected (§4.6 step 5).
        assert_eq!(result.nodes_pruned, 0);
        assert!(graph.get_node("n1").unwrap().is_some());
    }
}
