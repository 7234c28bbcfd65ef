use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    filings_processed: AtomicU64,
    chunks_summarized: AtomicU64,
    sections_summarized: AtomicU64,
    reports_generated: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filing that finished the full pipeline.
    pub fn record_filing(&self, chunk_summaries: u64, sections: u64) {
        self.filings_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_summaries, Ordering::Relaxed);
        self.sections_summarized
            .fetch_add(sections, Ordering::Relaxed);
        self.reports_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record chunks upserted into the vector index.
    pub fn record_indexed_chunks(&self, count: u64) {
        self.chunks_indexed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an answered question.
    pub fn record_question(&self) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            filings_processed: self.filings_processed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            sections_summarized: self.sections_summarized.load(Ordering::Relaxed),
            reports_generated: self.reports_generated.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of filings fully processed since startup.
    pub filings_processed: u64,
    /// Total chunk summaries produced across all filings.
    pub chunks_summarized: u64,
    /// Total section summaries produced across all filings.
    pub sections_summarized: u64,
    /// Total comprehensive reports generated.
    pub reports_generated: u64,
    /// Total retrieval chunks upserted into the vector index.
    pub chunks_indexed: u64,
    /// Total questions answered through the QA surface.
    pub questions_answered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_filings_and_chunks() {
        let metrics = PipelineMetrics::new();
        metrics.record_filing(5, 3);
        metrics.record_filing(2, 1);
        metrics.record_indexed_chunks(10);
        metrics.record_question();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.filings_processed, 2);
        assert_eq!(snapshot.chunks_summarized, 7);
        assert_eq!(snapshot.sections_summarized, 4);
        assert_eq!(snapshot.reports_generated, 2);
        assert_eq!(snapshot.chunks_indexed, 10);
        assert_eq!(snapshot.questions_answered, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot().filings_processed, 0);
        assert_eq!(metrics.snapshot().chunks_indexed, 0);
    }
}
