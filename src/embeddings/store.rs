//! Vector store (C3): dense embeddings persisted as a single file
//! containing the provider tag, dimension, an ordered ID array, and a 2-D
//! float array. Loaded once at startup, rewritten atomically on each add.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::cosine_similarity;
use crate::error::Result;
use crate::io_safety::atomic_write;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    provider: String,
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

pub struct VectorStore {
    path: PathBuf,
    provider: String,
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorStore {
    /// Load the store for `provider`/`dim` from `path`. If the file is
    /// missing, or its stored provider/dim disagree with the active
    /// provider, the store is rebuilt empty — per spec, this requires a
    /// retroactive reindex rather than attempting to reconcile dimensions.
    pub fn load_or_create(path: PathBuf, provider: &str, dim: usize) -> Self {
        if let Ok(raw) = std::fs::read_to_string(&path) {
            if let Ok(file) = serde_json::from_str::<StoreFile>(&raw) {
                if file.provider == provider && file.dim == dim {
                    return VectorStore {
                        path,
                        provider: file.provider,
                        dim: file.dim,
                        ids: file.ids,
                        vectors: file.vectors,
                    };
                }
            }
        }
        VectorStore {
            path,
            provider: provider.to_string(),
            dim,
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    fn save(&self) -> Result<()> {
        let file = StoreFile {
            provider: self.provider.clone(),
            dim: self.dim,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        let bytes = serde_json::to_vec(&file)?;
        atomic_write(&self.path, &bytes)
    }

    /// Append a row and persist the full store atomically. If `id` is
    /// already present its vector is replaced in place (re-embedding on
    /// chunk update is not part of this spec, but idempotent re-adds are
    /// cheap to support and avoid duplicate rows on retry).
    pub fn add(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if let Some(pos) = self.ids.iter().position(|existing| existing == id) {
            self.vectors[pos] = vector;
        } else {
            self.ids.push(id.to_string());
            self.vectors.push(vector);
        }
        self.save()
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.ids
            .iter()
            .position(|existing| existing == id)
            .map(|pos| self.vectors[pos].as_slice())
    }

    /// Brute-force cosine similarity of `query` against every stored row.
    /// `provider_tag` must match this store's provider or the result is
    /// empty (a query embedding from a different backend is meaningless
    /// here).
    pub fn cosine_all(&self, query: &[f32], provider_tag: &str) -> Vec<(String, f32)> {
        if provider_tag != self.provider {
            return Vec::new();
        }
        self.ids
            .par_iter()
            .zip(self.vectors.par_iter())
            .map(|(id, v)| (id.clone(), cosine_similarity(query, v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

pub fn default_store_path(root: &Path) -> PathBuf {
    root.join("embeddings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::load_or_create(dir.path().join("e.json"), "model2vec", 3);
        store.add("a", vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(store.get("a"), Some(&[1.0, 0.0, 0.0][..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cosine_all_ranks_by_similarity() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::load_or_create(dir.path().join("e.json"), "model2vec", 2);
        store.add("a", vec![1.0, 0.0]).unwrap();
        store.add("b", vec![0.0, 1.0]).unwrap();
        let mut scores = store.cosine_all(&[1.0, 0.0], "model2vec");
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        assert_eq!(scores[0].0, "a");
    }

    #[test]
    fn dimension_mismatch_rebuilds_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.json");
        let mut store = VectorStore::load_or_create(path.clone(), "model2vec", 3);
        store.add("a", vec![1.0, 0.0, 0.0]).unwrap();

        let reloaded = VectorStore::load_or_create(path, "model2vec", 4);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn provider_mismatch_yields_empty_cosine() {
        let dir = tempdir().unwrap();
        let mut store = VectorStore::load_or_create(dir.path().join("e.json"), "model2vec", 2);
        store.add("a", vec![1.0, 0.0]).unwrap();
        assert!(store.cosine_all(&[1.0, 0.0], "fastembed").is_empty());
    }
}
