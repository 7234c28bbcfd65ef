//! Qdrant integration: HTTP client, payload construction, and retrieval filters.
//!
//! The rest of the crate talks to the vector store through the [`VectorIndex`] trait so
//! the pipeline and QA layers can be exercised against in-process fakes.

mod client;
mod filters;
mod payload;
mod types;

pub use client::QdrantService;
pub use filters::build_chunk_filter;
pub use payload::{ChunkPayloadArgs, build_chunk_payload, chunk_point_id, compute_chunk_hash};
pub(crate) use payload::current_timestamp_rfc3339;
pub use types::{ChunkFilterArgs, PointUpsert, QdrantError, ScoredPoint};

use crate::config::get_config;
use async_trait::async_trait;

/// Vector store operations used by the indexer and the QA service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert prepared points, returning how many were written.
    async fn upsert(&self, points: Vec<PointUpsert>) -> Result<usize, QdrantError>;

    /// Similarity search scoped by the given filters.
    async fn query(
        &self,
        vector: Vec<f32>,
        filter: ChunkFilterArgs,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError>;
}

#[async_trait]
impl VectorIndex for QdrantService {
    async fn upsert(&self, points: Vec<PointUpsert>) -> Result<usize, QdrantError> {
        let collection = &get_config().qdrant_collection_name;
        self.upsert_points(collection, points).await
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        filter: ChunkFilterArgs,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let collection = &get_config().qdrant_collection_name;
        self.search_points(collection, vector, build_chunk_filter(&filter), limit)
            .await
    }
}
