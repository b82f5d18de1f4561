//! Flat inner-product vector index
//!
//! Exhaustive search over a contiguous `f32` buffer. With normalized
//! embeddings the inner product is cosine similarity. The index is immutable
//! while serving and safe to share across threads. Persisted with `bincode`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use fundfacts_core::write_atomic;

use crate::RagError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dim: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    /// Build an index from a batch of vectors of equal dimension
    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self, RagError> {
        let mut index = Self::new(dim);
        index.add(vectors)?;
        Ok(index)
    }

    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), RagError> {
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != self.dim {
                return Err(RagError::Index(format!(
                    "vector {} has dimension {}, index expects {}",
                    i,
                    v.len(),
                    self.dim
                )));
            }
        }
        self.vectors.reserve(vectors.len() * self.dim);
        for v in vectors {
            self.vectors.extend_from_slice(v);
        }
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, idx: usize) -> Option<&[f32]> {
        let start = idx.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    /// Top `k` `(score, index)` pairs by inner product, best first.
    ///
    /// Returns fewer than `k` when the corpus is smaller. Equal scores keep
    /// index order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, RagError> {
        if query.len() != self.dim {
            return Err(RagError::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dim
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(idx, v)| (dot(query, v), idx))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Persist the index atomically
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        write_atomic(path, |w| {
            bincode::serialize_into(&mut *w, self).map_err(|e| {
                fundfacts_core::Error::DataIntegrity(format!("failed to encode index: {}", e))
            })
        })?;

        tracing::info!(
            path = %path.display(),
            vectors = self.len(),
            dim = self.dim,
            "Saved vector index"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, RagError> {
        let file = File::open(path).map_err(|e| {
            RagError::Index(format!("failed to open index {}: {}", path.display(), e))
        })?;
        let index: FlatIndex = bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
            RagError::DataIntegrity(format!("failed to decode index {}: {}", path.display(), e))
        })?;
        index.validate()?;
        Ok(index)
    }

    /// The buffer must hold a whole number of `dim`-sized vectors
    fn validate(&self) -> Result<(), RagError> {
        let whole = if self.dim == 0 {
            self.vectors.is_empty()
        } else {
            self.vectors.len() % self.dim == 0
        };
        if !whole {
            return Err(RagError::DataIntegrity(format!(
                "index holds {} values, not a multiple of dimension {}",
                self.vectors.len(),
                self.dim
            )));
        }
        Ok(())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_search_orders_by_inner_product() {
        let index = FlatIndex::from_vectors(
            3,
            &[unit(3, 0), vec![0.6, 0.8, 0.0], unit(3, 1), unit(3, 2)],
        )
        .unwrap();

        let results = index.search(&[0.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, 2);
        assert_eq!(results[1].1, 1);
        assert!((results[1].0 - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_search_returns_fewer_than_k() {
        let index = FlatIndex::from_vectors(2, &[unit(2, 0)]).unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 1);

        let empty = FlatIndex::new(2);
        assert!(empty.search(&[1.0, 0.0], 10).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(3);
        assert!(index.add(&[vec![1.0, 0.0]]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        let index = FlatIndex::from_vectors(2, &[vec![0.5, -0.5], vec![1.0, 0.25]]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dim(), 2);
        assert_eq!(loaded.vector(1), Some(&[1.0, 0.25][..]));
    }

    #[test]
    fn test_truncated_file_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        FlatIndex::from_vectors(2, &[vec![0.5, -0.5]]).unwrap().save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 2);
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(FlatIndex::load(&path), Err(RagError::DataIntegrity(_))));
    }

    #[test]
    fn test_ragged_buffer_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.bin");
        let ragged = FlatIndex {
            dim: 3,
            vectors: vec![1.0, 0.0, 0.0, 0.5],
        };
        let mut file = std::fs::File::create(&path).unwrap();
        bincode::serialize_into(&mut file, &ragged).unwrap();
        drop(file);

        assert!(matches!(FlatIndex::load(&path), Err(RagError::DataIntegrity(_))));
    }
}
