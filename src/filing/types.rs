//! Typed records for filings, sections, and chunks.

use super::status::ProcessingStatus;
use serde::{Deserialize, Serialize};

/// Whether a chunk feeds summarization or the retrieval index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Large chunk consumed by the map-reduce summarizer.
    Summarization,
    /// Small chunk consumed by the embedding indexer.
    Embedding,
}

/// Durable per-filing record tracking processing stage and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    /// Unique accession identifier for the filing.
    pub accession: String,
    /// Ticker symbol the filing belongs to.
    pub ticker: String,
    /// Form type, e.g. `10-K` or `10-Q`.
    pub form_type: String,
    /// Filing date as an RFC3339 date string, when known.
    pub filed_on: Option<String>,
    /// Current pipeline stage.
    pub status: ProcessingStatus,
    /// Sections produced by segmentation.
    pub sections: Vec<SectionRecord>,
    /// Chunks produced by both chunking passes.
    pub chunks: Vec<ChunkRecord>,
    /// Text-store key of the comprehensive report, once written.
    pub report_key: Option<String>,
    /// Stable identifier of the comprehensive report.
    pub report_id: Option<String>,
    /// Long-lived retrieval locator for the report.
    pub report_url: Option<String>,
    /// Expiry of the retrieval locator, when one applies.
    pub report_url_expires_at: Option<String>,
    /// Human-readable reason recorded when the filing enters the error stage.
    pub error: Option<String>,
}

impl Filing {
    /// Create a fresh pending record for an ingestion request.
    pub fn new(ticker: &str, accession: &str, form_type: &str) -> Self {
        Self {
            accession: accession.to_string(),
            ticker: ticker.to_string(),
            form_type: form_type.to_string(),
            filed_on: None,
            status: ProcessingStatus::Pending,
            sections: Vec::new(),
            chunks: Vec::new(),
            report_key: None,
            report_id: None,
            report_url: None,
            report_url_expires_at: None,
            error: None,
        }
    }

    /// Chunks of the given type, in section order then chunk order.
    pub fn chunks_of(&self, chunk_type: ChunkType) -> Vec<&ChunkRecord> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.chunk_type == chunk_type)
            .collect()
    }

    /// The report reference for a completed filing, when available.
    pub fn report_reference(&self) -> Option<ReportReference> {
        match (&self.report_id, &self.report_key) {
            (Some(id), Some(key)) => Some(ReportReference {
                report_id: id.clone(),
                report_key: key.clone(),
                report_url: self.report_url.clone(),
            }),
            _ => None,
        }
    }
}

/// One named section of a filing. Immutable once created; re-segmentation replaces the set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Canonical section name.
    pub name: String,
    /// Literal header text as found in the source.
    pub header: String,
    /// Character count of the section text.
    pub char_count: usize,
    /// Text-store key holding the full section text.
    pub text_key: String,
}

/// One chunk of a section. Append-only; re-chunking replaces the per-section set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Section the chunk belongs to.
    pub section: String,
    /// Order of the chunk within its section and type.
    pub index: usize,
    /// Whether this chunk feeds summarization or embedding.
    pub chunk_type: ChunkType,
    /// Text-store key holding the chunk text.
    pub text_key: String,
    /// Character count of the chunk text.
    pub char_count: usize,
    /// Whether the chunk is an isolated table region.
    pub is_table: bool,
    /// Whether the chunk is an isolated footnote region.
    pub is_footnote: bool,
    /// Subheading in effect when the chunk was cut, when detected.
    pub subheading: Option<String>,
}

impl ChunkRecord {
    /// Text-store key for a chunk, stable across re-runs.
    pub fn storage_key(accession: &str, section: &str, chunk_type: ChunkType, index: usize) -> String {
        let kind = match chunk_type {
            ChunkType::Summarization => "summary",
            ChunkType::Embedding => "embed",
        };
        format!("chunks/{accession}/{section}/{kind}/{index}")
    }
}

/// Stable reference to a generated comprehensive report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportReference {
    /// Identifier assigned to the report.
    pub report_id: String,
    /// Text-store key holding the report body.
    pub report_key: String,
    /// Long-lived retrieval locator, when one was issued.
    pub report_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_filing_starts_pending_and_empty() {
        let filing = Filing::new("ACME", "0000123-24-000001", "10-K");
        assert_eq!(filing.status, ProcessingStatus::Pending);
        assert!(filing.sections.is_empty());
        assert!(filing.report_reference().is_none());
    }

    #[test]
    fn chunks_of_filters_by_type() {
        let mut filing = Filing::new("ACME", "acc-1", "10-K");
        for (index, chunk_type) in [
            ChunkType::Summarization,
            ChunkType::Embedding,
            ChunkType::Embedding,
        ]
        .into_iter()
        .enumerate()
        {
            filing.chunks.push(ChunkRecord {
                section: "Business".into(),
                index,
                chunk_type,
                text_key: ChunkRecord::storage_key("acc-1", "Business", chunk_type, index),
                char_count: 10,
                is_table: false,
                is_footnote: false,
                subheading: None,
            });
        }
        assert_eq!(filing.chunks_of(ChunkType::Summarization).len(), 1);
        assert_eq!(filing.chunks_of(ChunkType::Embedding).len(), 2);
    }

    #[test]
    fn storage_key_distinguishes_types() {
        let summary = ChunkRecord::storage_key("a", "Business", ChunkType::Summarization, 0);
        let embed = ChunkRecord::storage_key("a", "Business", ChunkType::Embedding, 0);
        assert_ne!(summary, embed);
        assert!(summary.contains("/summary/"));
        assert!(embed.contains("/embed/"));
    }
}
