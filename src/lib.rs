#![deny(missing_docs)]

//! Core library for the Filing Digest server.

/// HTTP routing and REST handlers.
pub mod api;
/// Dual-profile structural chunking.
pub mod chunking;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Filing records, processing state machine, and metadata store.
pub mod filing;
/// Embedding indexer for retrieval chunks.
pub mod indexer;
/// Completion client abstraction for language-model calls.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and question-answering metrics helpers.
pub mod metrics;
/// Workflow coordinator driving the ingestion pipeline.
pub mod pipeline;
/// Retrieval-augmented question answering.
pub mod qa;
/// Qdrant vector store integration.
pub mod qdrant;
/// Section segmentation for filing documents.
pub mod segmenter;
/// Filing document source collaborator.
pub mod source;
/// Chunk and report text storage.
pub mod storage;
/// Map-reduce summarization orchestrator.
pub mod summarize;
