use std::{path::Path, sync::Arc};

use text_splitter::{ChunkConfig, TextSplitter};
use tracing::info;

use common::{error::AppError, storage::index::VectorIndex, utils::embedding::EmbeddingProvider};

use crate::pdf::extract_pdf_text;

/// Chunk capacity and neighbour overlap, both in characters.
pub const CHUNK_CAPACITY: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;

pub struct IngestionPipeline {
    embedding_provider: Arc<EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self { embedding_provider }
    }

    /// Runs the ingestion sequence for one uploaded PDF: extract the text,
    /// split it into overlapping chunks, embed every chunk, and assemble the
    /// session's replacement index. Persisting the result is the caller's job.
    pub async fn ingest(&self, file_path: &Path) -> Result<VectorIndex, AppError> {
        let text = extract_pdf_text(file_path).await?;
        if text.trim().is_empty() {
            return Err(AppError::Validation("No readable text found in PDF".into()));
        }

        let chunks = split_into_chunks(&text)?;
        if chunks.is_empty() {
            return Err(AppError::Validation("No text found after splitting".into()));
        }

        info!(
            chars = text.len(),
            chunks = chunks.len(),
            backend = self.embedding_provider.backend_label(),
            "embedding document chunks"
        );

        let embeddings = self.embedding_provider.embed_batch(chunks.clone()).await?;

        Ok(VectorIndex::new(
            self.embedding_provider.backend_label(),
            self.embedding_provider.dimension(),
            chunks.into_iter().zip(embeddings).collect(),
        ))
    }
}

/// Splits extracted text into chunks of at most `CHUNK_CAPACITY` characters
/// with `CHUNK_OVERLAP` characters carried over between neighbours.
pub fn split_into_chunks(text: &str) -> Result<Vec<String>, AppError> {
    let chunk_config = ChunkConfig::new(CHUNK_CAPACITY)
        .with_overlap(CHUNK_OVERLAP)
        .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?;
    let splitter = TextSplitter::new(chunk_config);

    Ok(splitter.chunks(text).map(str::to_owned).collect())
}
