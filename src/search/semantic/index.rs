//! Flat in-memory vector index.
//!
//! Vectors are addressed by their insertion position, which matches the
//! position of the embedded document in its snapshot. Every vector is
//! L2-normalized on the way in, and every query on the way into `search`,
//! so squared distances map straight onto cosine similarity.

use rayon::prelude::*;

/// A search hit: position in the index and squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance_sq: f32,
}

/// Exhaustive nearest-neighbor index over unit vectors.
pub struct VectorIndex {
    /// Row-major, `len * dimensions` components
    vectors: Vec<f32>,
    dimensions: usize,
}

impl VectorIndex {
    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            vectors: Vec::with_capacity(dimensions * capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            return 0;
        }
        self.vectors.len() / self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a vector, returning its position.
    ///
    /// Returns an error if the embedding has the wrong dimensions or zero
    /// norm (cannot be normalized).
    pub fn insert(&mut self, mut embedding: Vec<f32>) -> Result<usize, IndexError> {
        self.check_dimensions(&embedding)?;
        l2_normalize(&mut embedding)?;

        let position = self.len();
        self.vectors.extend_from_slice(&embedding);
        Ok(position)
    }

    /// The `k` nearest vectors to `query`, closest first.
    ///
    /// Equal distances keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimensions(query)?;

        let mut query = query.to_vec();
        l2_normalize(&mut query)?;

        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .par_chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance_sq: squared_distance(&query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance_sq
                .partial_cmp(&b.distance_sq)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }
}

/// Cosine similarity of two unit vectors from their squared L2 distance.
///
/// |a - b|^2 = 2 - 2 cos(a, b) when |a| = |b| = 1.
pub fn similarity_from_distance(distance_sq: f32) -> f32 {
    1.0 - distance_sq / 2.0
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn l2_normalize(v: &mut [f32]) -> Result<(), IndexError> {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm < f32::EPSILON {
        return Err(IndexError::ZeroNormVector);
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Ok(())
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}
