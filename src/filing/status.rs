//! Processing stages for a filing and the legal transitions between them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage recorded for each filing.
///
/// Stages advance monotonically; skipping a stage is rejected. `Error` is reachable from any
/// non-terminal stage and `Completed` filings short-circuit re-processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Ingestion requested, nothing started yet.
    Pending,
    /// Segmenting and chunking the document.
    Chunking,
    /// Sections and chunks persisted.
    ChunkingComplete,
    /// Map-reduce summarization in flight.
    Summarizing,
    /// Section summaries and the comprehensive report exist.
    SummarizationComplete,
    /// Retrieval chunks being embedded and upserted.
    Embedding,
    /// All retrieval chunks indexed.
    EmbeddingComplete,
    /// Pipeline finished; report reference is stable.
    Completed,
    /// A document-level failure halted processing.
    Error,
}

/// Violation of the stage transition table.
#[derive(Debug, Error)]
#[error("illegal status transition: {from:?} -> {to:?}")]
pub struct StatusError {
    /// Stage the filing was in.
    pub from: ProcessingStatus,
    /// Stage the transition attempted to reach.
    pub to: ProcessingStatus,
}

impl ProcessingStatus {
    /// The stage that legally follows this one, when one exists.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Chunking),
            Self::Chunking => Some(Self::ChunkingComplete),
            Self::ChunkingComplete => Some(Self::Summarizing),
            Self::Summarizing => Some(Self::SummarizationComplete),
            Self::SummarizationComplete => Some(Self::Embedding),
            Self::Embedding => Some(Self::EmbeddingComplete),
            Self::EmbeddingComplete => Some(Self::Completed),
            Self::Completed | Self::Error => None,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Validate a transition against the table: one step forward, or to `Error` from any
    /// non-terminal stage.
    pub fn validate_transition(self, to: Self) -> Result<(), StatusError> {
        if to == Self::Error && !self.is_terminal() {
            return Ok(());
        }
        if self.next() == Some(to) {
            return Ok(());
        }
        Err(StatusError { from: self, to })
    }

    /// Stable snake_case label used in persisted records and API payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Chunking => "chunking",
            Self::ChunkingComplete => "chunking_complete",
            Self::Summarizing => "summarizing",
            Self::SummarizationComplete => "summarization_complete",
            Self::Embedding => "embedding",
            Self::EmbeddingComplete => "embedding_complete",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = ProcessingStatus::Pending;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage.validate_transition(next).expect("forward step legal");
            stage = next;
            seen.push(stage);
        }
        assert_eq!(stage, ProcessingStatus::Completed);
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let error = ProcessingStatus::Pending
            .validate_transition(ProcessingStatus::Summarizing)
            .unwrap_err();
        assert_eq!(error.from, ProcessingStatus::Pending);
        assert_eq!(error.to, ProcessingStatus::Summarizing);
    }

    #[test]
    fn error_is_reachable_from_any_nonterminal_stage() {
        for stage in [
            ProcessingStatus::Pending,
            ProcessingStatus::Chunking,
            ProcessingStatus::Summarizing,
            ProcessingStatus::Embedding,
        ] {
            stage
                .validate_transition(ProcessingStatus::Error)
                .expect("error reachable");
        }
    }

    #[test]
    fn terminal_stages_do_not_transition() {
        assert!(
            ProcessingStatus::Completed
                .validate_transition(ProcessingStatus::Error)
                .is_err()
        );
        assert!(
            ProcessingStatus::Error
                .validate_transition(ProcessingStatus::Pending)
                .is_err()
        );
    }
}
