use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// One embedded span of document text. `position` is the chunk's place in the
/// original reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub position: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// The serialized similarity index for one session's document. Replaced
/// wholesale on every upload, never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub version: u32,
    pub embedding_backend: String,
    pub embedding_dimension: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub position: usize,
    pub score: f32,
}

impl VectorIndex {
    pub fn new(
        embedding_backend: &str,
        embedding_dimension: usize,
        chunks: Vec<(String, Vec<f32>)>,
    ) -> Self {
        let chunks = chunks
            .into_iter()
            .enumerate()
            .map(|(position, (text, embedding))| IndexedChunk {
                id: Uuid::new_v4().to_string(),
                position,
                text,
                embedding,
            })
            .collect();

        Self {
            version: INDEX_FORMAT_VERSION,
            embedding_backend: embedding_backend.to_string(),
            embedding_dimension,
            created_at: Utc::now(),
            chunks,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Ranks all chunks by cosine similarity against `query` and returns the
    /// top `k`. Chunks whose stored vector width differs from the query score
    /// zero rather than failing the whole search.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                text: chunk.text.clone(),
                position: chunk.position,
                score: cosine_similarity(query, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
