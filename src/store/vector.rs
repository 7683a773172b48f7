//! In-memory cosine-similarity index over stored artifacts.

use crate::artifact::{ArtifactId, ArtifactKind};

/// Vector embedding (simple f32 vector)
pub type Embedding = Vec<f32>;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub embedding: Embedding,
}

/// Linear-scan index kept in insertion order.
///
/// Ranking uses a stable sort, so equal scores keep insertion order
/// and retrieval is deterministic for a fixed corpus.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|e| e.id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k entries by cosine similarity, optionally filtered to one kind.
    pub fn search(
        &self,
        query: &Embedding,
        kind: Option<ArtifactKind>,
        k: usize,
    ) -> Vec<(ArtifactId, f32)> {
        let mut scored: Vec<(ArtifactId, f32)> = self
            .entries
            .iter()
            .filter(|e| kind.map_or(true, |wanted| e.kind == wanted))
            .map(|e| (e.id.clone(), cosine_similarity(query, &e.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
