//! Batch embedding and upsert of retrieval chunks into the vector index.

use crate::embedding::EmbeddingClient;
use crate::filing::ChunkRecord;
use crate::qdrant::{
    ChunkPayloadArgs, PointUpsert, VectorIndex, build_chunk_payload, chunk_point_id,
    compute_chunk_hash, current_timestamp_rfc3339,
};
use crate::storage::{TextStore, TextStoreError};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while indexing retrieval chunks.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Chunk text storage failed outright.
    #[error(transparent)]
    Storage(#[from] TextStoreError),
}

/// Embeds retrieval chunks in batches and upserts them with deterministic identifiers.
///
/// A batch whose embedding or upsert fails is skipped with a warning; the remaining
/// batches still index. Chunks whose text is missing from storage are skipped per chunk.
pub struct EmbeddingIndexer {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    texts: Arc<dyn TextStore>,
    batch_size: usize,
}

impl EmbeddingIndexer {
    /// Create an indexer with the given batch size.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        texts: Arc<dyn TextStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            texts,
            batch_size: batch_size.max(1),
        }
    }

    /// Index the given retrieval chunks for a filing, returning how many points were
    /// upserted.
    pub async fn index_chunks(
        &self,
        ticker: &str,
        accession: &str,
        chunks: &[ChunkRecord],
    ) -> Result<usize, IndexerError> {
        let timestamp = current_timestamp_rfc3339();

        let mut indexed = 0usize;
        for batch in chunks.chunks(self.batch_size) {
            let mut texts = Vec::with_capacity(batch.len());
            let mut members = Vec::with_capacity(batch.len());
            for chunk in batch {
                match self.texts.get(&chunk.text_key).await? {
                    Some(text) => {
                        texts.push(text);
                        members.push(chunk);
                    }
                    None => {
                        tracing::warn!(
                            accession,
                            text_key = %chunk.text_key,
                            "Chunk text missing from storage, skipping"
                        );
                    }
                }
            }
            if members.is_empty() {
                continue;
            }

            let vectors = match self.embedder.generate_embeddings(texts.clone()).await {
                Ok(vectors) => vectors,
                Err(error) => {
                    tracing::warn!(accession, error = %error, batch = members.len(), "Embedding batch failed, skipping");
                    continue;
                }
            };

            let points: Vec<PointUpsert> = members
                .iter()
                .zip(vectors)
                .zip(texts.iter())
                .map(|((chunk, vector), text)| PointUpsert {
                    id: chunk_point_id(accession, &chunk.section, chunk.index),
                    vector,
                    payload: build_chunk_payload(
                        &ChunkPayloadArgs {
                            ticker,
                            accession,
                            section: &chunk.section,
                            chunk_index: chunk.index,
                            text_key: &chunk.text_key,
                            char_count: chunk.char_count,
                        },
                        &compute_chunk_hash(text),
                        &timestamp,
                    ),
                })
                .collect();

            match self.index.upsert(points).await {
                Ok(count) => indexed += count,
                Err(error) => {
                    tracing::warn!(accession, error = %error, batch = members.len(), "Upsert batch failed, skipping");
                }
            }
        }

        tracing::info!(accession, indexed, total = chunks.len(), "Retrieval chunks indexed");
        Ok(indexed)
    }
}
