//! Filing metadata store: durable per-filing records keyed by accession.

use super::status::{ProcessingStatus, StatusError};
use super::types::{ChunkRecord, Filing, SectionRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by the filing metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No filing is recorded under the given accession.
    #[error("unknown filing: {0}")]
    UnknownFiling(String),
    /// A stage transition violated the state machine.
    #[error(transparent)]
    IllegalTransition(#[from] StatusError),
}

/// Durable record store mutated by every pipeline stage.
///
/// Each stage reads then writes a filing at most once per transition; stages are never
/// re-entered concurrently for the same filing, so the store only needs per-call atomicity.
#[async_trait]
pub trait FilingStore: Send + Sync {
    /// Fetch a filing by accession.
    async fn get(&self, accession: &str) -> Option<Filing>;

    /// Return the existing filing or create a fresh pending record.
    async fn ensure(&self, ticker: &str, accession: &str, form_type: &str) -> Filing;

    /// Advance the filing one stage, validating against the transition table.
    async fn advance(&self, accession: &str, to: ProcessingStatus) -> Result<Filing, StoreError>;

    /// Record a document-level failure and move the filing to the error stage.
    async fn mark_error(&self, accession: &str, message: &str) -> Result<(), StoreError>;

    /// Replace the filing's section and chunk sets wholesale.
    async fn set_structure(
        &self,
        accession: &str,
        sections: Vec<SectionRecord>,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), StoreError>;

    /// Record the comprehensive report outputs.
    async fn set_report(
        &self,
        accession: &str,
        report_id: &str,
        report_key: &str,
        report_url: Option<String>,
        expires_at: Option<String>,
    ) -> Result<(), StoreError>;
}

/// In-process store backed by a `RwLock`ed map. Records are never deleted.
#[derive(Default)]
pub struct InMemoryFilingStore {
    filings: RwLock<HashMap<String, Filing>>,
}

impl InMemoryFilingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, accession: &str, apply: F) -> Result<Filing, StoreError>
    where
        F: FnOnce(&mut Filing) -> Result<(), StoreError>,
    {
        let mut filings = self.filings.write().await;
        let filing = filings
            .get_mut(accession)
            .ok_or_else(|| StoreError::UnknownFiling(accession.to_string()))?;
        apply(filing)?;
        Ok(filing.clone())
    }
}

#[async_trait]
impl FilingStore for InMemoryFilingStore {
    async fn get(&self, accession: &str) -> Option<Filing> {
        self.filings.read().await.get(accession).cloned()
    }

    async fn ensure(&self, ticker: &str, accession: &str, form_type: &str) -> Filing {
        let mut filings = self.filings.write().await;
        filings
            .entry(accession.to_string())
            .or_insert_with(|| Filing::new(ticker, accession, form_type))
            .clone()
    }

    async fn advance(&self, accession: &str, to: ProcessingStatus) -> Result<Filing, StoreError> {
        let updated = self
            .update(accession, |filing| {
                filing.status.validate_transition(to)?;
                filing.status = to;
                Ok(())
            })
            .await?;
        tracing::debug!(accession, stage = updated.status.as_str(), "Stage advanced");
        Ok(updated)
    }

    async fn mark_error(&self, accession: &str, message: &str) -> Result<(), StoreError> {
        self.update(accession, |filing| {
            filing.status.validate_transition(ProcessingStatus::Error)?;
            filing.status = ProcessingStatus::Error;
            filing.error = Some(message.to_string());
            Ok(())
        })
        .await?;
        tracing::warn!(accession, message, "Filing marked as errored");
        Ok(())
    }

    async fn set_structure(
        &self,
        accession: &str,
        sections: Vec<SectionRecord>,
        chunks: Vec<ChunkRecord>,
    ) -> Result<(), StoreError> {
        self.update(accession, |filing| {
            filing.sections = sections;
            filing.chunks = chunks;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn set_report(
        &self,
        accession: &str,
        report_id: &str,
        report_key: &str,
        report_url: Option<String>,
        expires_at: Option<String>,
    ) -> Result<(), StoreError> {
        self.update(accession, |filing| {
            filing.report_id = Some(report_id.to_string());
            filing.report_key = Some(report_key.to_string());
            filing.report_url = report_url;
            filing.report_url_expires_at = expires_at;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = InMemoryFilingStore::new();
        let first = store.ensure("ACME", "acc-1", "10-K").await;
        store
            .advance("acc-1", ProcessingStatus::Chunking)
            .await
            .unwrap();
        let second = store.ensure("ACME", "acc-1", "10-K").await;
        assert_eq!(first.accession, second.accession);
        assert_eq!(second.status, ProcessingStatus::Chunking);
    }

    #[tokio::test]
    async fn advance_rejects_stage_skips() {
        let store = InMemoryFilingStore::new();
        store.ensure("ACME", "acc-1", "10-K").await;
        let error = store
            .advance("acc-1", ProcessingStatus::Embedding)
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::IllegalTransition(_)));
        // The failed transition must not have mutated the record.
        let filing = store.get("acc-1").await.unwrap();
        assert_eq!(filing.status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn mark_error_records_message() {
        let store = InMemoryFilingStore::new();
        store.ensure("ACME", "acc-1", "10-K").await;
        store.mark_error("acc-1", "source unavailable").await.unwrap();
        let filing = store.get("acc-1").await.unwrap();
        assert_eq!(filing.status, ProcessingStatus::Error);
        assert_eq!(filing.error.as_deref(), Some("source unavailable"));
    }

    #[tokio::test]
    async fn unknown_accession_is_an_error() {
        let store = InMemoryFilingStore::new();
        assert!(store.get("missing").await.is_none());
        assert!(matches!(
            store.mark_error("missing", "nope").await.unwrap_err(),
            StoreError::UnknownFiling(_)
        ));
    }
}
