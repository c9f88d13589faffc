//! USearch-backed persistent vector store (§4.2), grounded directly on the
//! teacher crate's `VectorIndex` wrapper: an HNSW index keyed by `u64`, with
//! a side `String <-> u64` map since node ids are content-derived hex
//! strings rather than small integers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorStoreError;

use super::{VectorMatch, VectorStore};

struct KeyMap {
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: AtomicU64,
}

impl KeyMap {
    fn new() -> Self {
        Self {
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn id_for(&mut self, key: &str) -> u64 {
        if let Some(id) = self.key_to_id.get(key) {
            return *id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());
        id
    }

    fn remove(&mut self, key: &str) -> Option<u64> {
        let id = self.key_to_id.remove(key)?;
        self.id_to_key.remove(&id);
        Some(id)
    }
}

/// An HNSW cosine-similarity index persisted alongside the SQLite database
/// file (§4.2 — satisfies the spec's "ANN-capable embedded table"
/// assumption via USearch's own on-disk format instead of a SQLite virtual
/// table).
pub struct UsearchVectorStore {
    index: RwLock<Index>,
    keys: RwLock<KeyMap>,
    path: Option<PathBuf>,
}

impl UsearchVectorStore {
    /// Create a fresh (unpersisted) index for `dimensions`-length vectors.
    pub fn new(dimensions: usize) -> Result<Self, VectorStoreError> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(|e| VectorStoreError::Index(e.to_string()))?;
        index
            .reserve(1024)
            .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        Ok(Self {
            index: RwLock::new(index),
            keys: RwLock::new(KeyMap::new()),
            path: None,
        })
    }

    /// Open (loading if present) an index persisted at `path`.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, VectorStoreError> {
        let store = Self::new(dimensions)?;
        if path.exists() {
            store
                .index
                .read()
                .expect("usearch index lock poisoned")
                .load(path.to_string_lossy().as_ref())
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..store
        })
    }

    fn reserve_if_needed(&self, additional: usize) -> Result<(), VectorStoreError> {
        let index = self.index.read().expect("usearch index lock poisoned");
        let needed = index.size() + additional;
        if needed > index.capacity() {
            index
                .reserve(needed.max(index.capacity() * 2))
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        }
        Ok(())
    }

    /// Persist the index to its configured path, if any (§4.2 Close()).
    pub fn save(&self) -> Result<(), VectorStoreError> {
        if let Some(path) = &self.path {
            self.index
                .read()
                .expect("usearch index lock poisoned")
                .save(path.to_string_lossy().as_ref())
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        }
        Ok(())
    }
}

impl VectorStore for UsearchVectorStore {
    fn upsert(&self, key: &str, embedding: &[f32]) -> Result<(), VectorStoreError> {
        let mut keys = self.keys.write().expect("usearch key map lock poisoned");
        if let Some(existing_id) = keys.key_to_id.get(key).copied() {
            let index = self.index.read().expect("usearch index lock poisoned");
            let _ = index.remove(existing_id);
        }
        self.reserve_if_needed(1)?;
        let id = keys.id_for(key);
        let index = self.index.read().expect("usearch index lock poisoned");
        index
            .add(id, embedding)
            .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), VectorStoreError> {
        let mut keys = self.keys.write().expect("usearch key map lock poisoned");
        if let Some(id) = keys.remove(key) {
            let index = self.index.read().expect("usearch index lock poisoned");
            index
                .remove(id)
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let keys = self.keys.read().expect("usearch key map lock poisoned");
        let index = self.index.read().expect("usearch index lock poisoned");
        let matches = index
            .search(query, top_k)
            .map_err(|e| VectorStoreError::Index(e.to_string()))?;

        let mut out = Vec::with_capacity(matches.keys.len());
        for (id, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            if let Some(key) = keys.id_to_key.get(id) {
                // USearch's cosine metric returns a distance in [0, 2];
                // convert back to a similarity score in [-1, 1].
                out.push(VectorMatch {
                    key: key.clone(),
                    score: 1.0 - (*distance as f64),
                });
            }
        }
        Ok(out)
    }

    fn len(&self) -> usize {
        self.index.read().expect("usearch index lock poisoned").size()
    }

    fn close(&self) -> Result<(), VectorStoreError> {
        self.save()
    }
}
