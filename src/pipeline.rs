//! Workflow coordinator driving a filing through segmentation, chunking, summarization,
//! and indexing.
//!
//! Each stage advances the filing's status before it runs and records its completion
//! marker afterwards. Document-level failures mark the filing as errored; a completed
//! filing short-circuits with its existing report and issues no model calls.

use crate::chunking::{ChunkPiece, ChunkProfile, SubheadingDetector, chunk_section};
use crate::filing::{
    ChunkRecord, ChunkType, Filing, FilingStore, ProcessingStatus, ReportReference, StoreError,
};
use crate::indexer::{EmbeddingIndexer, IndexerError};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::qa::{Answer, AnswerError, AnswerService};
use crate::segmenter::segment_filing;
use crate::source::{FilingSource, SourceError};
use crate::storage::{TextStore, TextStoreError};
use crate::summarize::{SectionChunks, SummaryError, SummaryOrchestrator};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the pipeline to callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The filing is mid-pipeline from an earlier request.
    #[error("Filing {accession} is already being processed (status: {status})")]
    InProgress {
        /// Accession of the filing.
        accession: String,
        /// Stage the filing is currently in.
        status: String,
    },
    /// The filing previously failed and will not be retried.
    #[error("Filing {accession} previously failed: {message}")]
    PreviouslyFailed {
        /// Accession of the filing.
        accession: String,
        /// Recorded failure reason.
        message: String,
    },
    /// The source returned a document with no usable text.
    #[error("Filing {0} contained no text")]
    EmptyFiling(String),
    /// Fetching the raw document failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Filing metadata store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Text storage failed.
    #[error(transparent)]
    Storage(#[from] TextStoreError),
    /// Report generation failed.
    #[error(transparent)]
    Summary(#[from] SummaryError),
    /// Retrieval indexing failed.
    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

/// Operations the HTTP surface needs from the pipeline.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Process a filing end to end, returning the comprehensive report reference.
    async fn process_filing(
        &self,
        ticker: &str,
        accession: &str,
        form_type: &str,
    ) -> Result<ReportReference, PipelineError>;

    /// Current record for a filing, when one exists.
    async fn get_status(&self, accession: &str) -> Option<Filing>;

    /// Answer a question against one indexed filing, optionally overriding the retrieval
    /// depth for this call.
    async fn answer(
        &self,
        ticker: &str,
        accession: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Answer, AnswerError>;

    /// Snapshot of pipeline counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Concrete pipeline wiring together the stage collaborators.
pub struct FilingPipeline {
    source: Arc<dyn FilingSource>,
    store: Arc<dyn FilingStore>,
    texts: Arc<dyn TextStore>,
    summarizer: SummaryOrchestrator,
    indexer: EmbeddingIndexer,
    qa: AnswerService,
    detector: Box<dyn SubheadingDetector>,
    summary_profile: ChunkProfile,
    embedding_profile: ChunkProfile,
    metrics: Arc<PipelineMetrics>,
}

impl FilingPipeline {
    /// Assemble a pipeline from its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn FilingSource>,
        store: Arc<dyn FilingStore>,
        texts: Arc<dyn TextStore>,
        summarizer: SummaryOrchestrator,
        indexer: EmbeddingIndexer,
        qa: AnswerService,
        detector: Box<dyn SubheadingDetector>,
        summary_profile: ChunkProfile,
        embedding_profile: ChunkProfile,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            source,
            store,
            texts,
            summarizer,
            indexer,
            qa,
            detector,
            summary_profile,
            embedding_profile,
            metrics,
        }
    }

    async fn run_stages(
        &self,
        ticker: &str,
        accession: &str,
        form_type: &str,
    ) -> Result<ReportReference, PipelineError> {
        // Chunking stage: fetch, segment, cut both chunk sets, persist texts. The filing
        // is already in the chunking stage when this runs.
        let raw = self.source.fetch_filing(ticker, accession).await?;
        let sections = segment_filing(&raw);
        if sections.is_empty() {
            return Err(PipelineError::EmptyFiling(accession.to_string()));
        }

        let mut section_records = Vec::with_capacity(sections.len());
        let mut chunk_records = Vec::new();
        let mut summary_inputs = Vec::with_capacity(sections.len());
        for section in &sections {
            let text_key = format!("sections/{accession}/{}", section.name);
            self.texts.put(&text_key, &section.text).await?;
            section_records.push(crate::filing::SectionRecord {
                name: section.name.clone(),
                header: section.header.clone(),
                char_count: section.text.chars().count(),
                text_key,
            });

            let summary_chunks =
                chunk_section(&section.text, self.summary_profile, self.detector.as_ref());
            let summary_texts = self
                .persist_chunks(
                    accession,
                    &section.name,
                    ChunkType::Summarization,
                    &summary_chunks,
                    &mut chunk_records,
                )
                .await?;
            summary_inputs.push(SectionChunks {
                section: section.name.clone(),
                chunks: summary_texts,
            });

            let embed_chunks =
                chunk_section(&section.text, self.embedding_profile, self.detector.as_ref());
            self.persist_chunks(
                accession,
                &section.name,
                ChunkType::Embedding,
                &embed_chunks,
                &mut chunk_records,
            )
            .await?;
        }

        self.store
            .set_structure(accession, section_records, chunk_records.clone())
            .await?;
        self.store
            .advance(accession, ProcessingStatus::ChunkingComplete)
            .await?;
        tracing::info!(
            accession,
            sections = sections.len(),
            chunks = chunk_records.len(),
            "Filing segmented and chunked"
        );

        // Summarization stage: map-reduce into the comprehensive report.
        self.store
            .advance(accession, ProcessingStatus::Summarizing)
            .await?;
        let report = self
            .summarizer
            .summarize_filing(ticker, form_type, summary_inputs)
            .await?;

        let report_id = Uuid::new_v4().to_string();
        let report_key = format!("reports/{accession}/{report_id}");
        self.texts.put(&report_key, &report.body).await?;
        self.store
            .set_report(accession, &report_id, &report_key, None, None)
            .await?;
        self.store
            .advance(accession, ProcessingStatus::SummarizationComplete)
            .await?;

        let chunk_summaries: u64 = report
            .sections
            .iter()
            .map(|section| section.chunk_summaries_used as u64)
            .sum();
        self.metrics
            .record_filing(chunk_summaries, report.sections.len() as u64);

        // Embedding stage: batch embed and upsert the retrieval chunks.
        self.store
            .advance(accession, ProcessingStatus::Embedding)
            .await?;
        let embed_records: Vec<ChunkRecord> = chunk_records
            .into_iter()
            .filter(|chunk| chunk.chunk_type == ChunkType::Embedding)
            .collect();
        let indexed = self
            .indexer
            .index_chunks(ticker, accession, &embed_records)
            .await?;
        self.metrics.record_indexed_chunks(indexed as u64);
        self.store
            .advance(accession, ProcessingStatus::EmbeddingComplete)
            .await?;

        self.store
            .advance(accession, ProcessingStatus::Completed)
            .await?;
        tracing::info!(accession, report_id, "Filing pipeline completed");

        Ok(ReportReference {
            report_id,
            report_key,
            report_url: None,
        })
    }

    async fn persist_chunks(
        &self,
        accession: &str,
        section: &str,
        chunk_type: ChunkType,
        chunks: &[ChunkPiece],
        records: &mut Vec<ChunkRecord>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut texts = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let text_key = ChunkRecord::storage_key(accession, section, chunk_type, index);
            self.texts.put(&text_key, &chunk.text).await?;
            records.push(ChunkRecord {
                section: section.to_string(),
                index,
                chunk_type,
                text_key,
                char_count: chunk.text.chars().count(),
                is_table: chunk.is_table,
                is_footnote: chunk.is_footnote,
                subheading: chunk.subheading.clone(),
            });
            texts.push(chunk.text.clone());
        }
        Ok(texts)
    }
}

#[async_trait]
impl PipelineApi for FilingPipeline {
    async fn process_filing(
        &self,
        ticker: &str,
        accession: &str,
        form_type: &str,
    ) -> Result<ReportReference, PipelineError> {
        let filing = self.store.ensure(ticker, accession, form_type).await;
        match filing.status {
            ProcessingStatus::Completed => {
                tracing::info!(accession, "Filing already completed, returning existing report");
                return filing.report_reference().ok_or_else(|| {
                    PipelineError::PreviouslyFailed {
                        accession: accession.to_string(),
                        message: "completed filing has no report reference".to_string(),
                    }
                });
            }
            ProcessingStatus::Error => {
                return Err(PipelineError::PreviouslyFailed {
                    accession: accession.to_string(),
                    message: filing.error.unwrap_or_else(|| "unknown failure".to_string()),
                });
            }
            ProcessingStatus::Pending => {}
            other => {
                return Err(PipelineError::InProgress {
                    accession: accession.to_string(),
                    status: other.as_str().to_string(),
                });
            }
        }

        // Claim the filing before doing any work. Two requests can both observe a pending
        // record; only one wins this transition, and the loser reports the filing as
        // in progress instead of erroring the live run.
        if let Err(claim) = self
            .store
            .advance(accession, ProcessingStatus::Chunking)
            .await
        {
            return Err(match claim {
                StoreError::IllegalTransition(_) => {
                    let status = self
                        .store
                        .get(accession)
                        .await
                        .map(|current| current.status.as_str().to_string())
                        .unwrap_or_else(|| ProcessingStatus::Chunking.as_str().to_string());
                    PipelineError::InProgress {
                        accession: accession.to_string(),
                        status,
                    }
                }
                other => PipelineError::Store(other),
            });
        }

        match self.run_stages(ticker, accession, form_type).await {
            Ok(reference) => Ok(reference),
            Err(error) => {
                if let Err(mark_error) = self.store.mark_error(accession, &error.to_string()).await
                {
                    tracing::error!(accession, error = %mark_error, "Failed to record filing error");
                }
                Err(error)
            }
        }
    }

    async fn get_status(&self, accession: &str) -> Option<Filing> {
        self.store.get(accession).await
    }

    async fn answer(
        &self,
        ticker: &str,
        accession: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Answer, AnswerError> {
        let answer = self.qa.answer(ticker, accession, question, top_k).await?;
        self.metrics.record_question();
        Ok(answer)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
