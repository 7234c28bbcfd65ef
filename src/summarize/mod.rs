//! Map-reduce summarization over segmented filing sections.
//!
//! The map phase summarizes each large chunk under a shared concurrency bound; failed or
//! empty chunk summaries are dropped rather than failing the run. The reduce phase merges
//! the survivors into one summary per section, substituting a placeholder when a section
//! has nothing usable. Only the final report synthesis is a document-level failure.

mod prompts;

use crate::llm::{CompletionClient, CompletionRequest, complete_with_backoff};
use futures_util::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Summary recorded for a section that produced no usable chunk summaries.
pub const SECTION_PLACEHOLDER: &str = "No content available for this section.";

/// Errors that abort report generation for the whole filing.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Final report synthesis failed.
    #[error("Failed to synthesize comprehensive report: {0}")]
    ReportFailed(String),
    /// No sections remained after applying the section policy.
    #[error("No sections eligible for summarization")]
    NoSections,
}

/// A section's large chunks, in document order, ready for the map phase.
#[derive(Debug, Clone)]
pub struct SectionChunks {
    /// Canonical section name.
    pub section: String,
    /// Chunk texts in order.
    pub chunks: Vec<String>,
}

/// Summary produced for one section by the reduce phase.
#[derive(Debug, Clone)]
pub struct SectionSummary {
    /// Canonical section name.
    pub section: String,
    /// Merged section summary, or [`SECTION_PLACEHOLDER`].
    pub summary: String,
    /// Chunk summaries that survived the map phase for this section.
    pub chunk_summaries_used: usize,
}

/// Comprehensive report assembled from all section summaries.
#[derive(Debug, Clone)]
pub struct FilingReport {
    /// Full report body.
    pub body: String,
    /// Per-section summaries in document order.
    pub sections: Vec<SectionSummary>,
}

/// Drives the map-reduce summarization passes against a completion provider.
pub struct SummaryOrchestrator {
    client: Arc<dyn CompletionClient>,
    model: String,
    map_concurrency: usize,
    section_concurrency: usize,
    section_allowlist: Option<Vec<String>>,
}

impl SummaryOrchestrator {
    /// Create an orchestrator with explicit concurrency bounds.
    ///
    /// When `section_allowlist` is set, only the named sections are summarized; otherwise
    /// every segmented section participates.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model: String,
        map_concurrency: usize,
        section_concurrency: usize,
        section_allowlist: Option<Vec<String>>,
    ) -> Self {
        Self {
            client,
            model,
            map_concurrency: map_concurrency.max(1),
            section_concurrency: section_concurrency.max(1),
            section_allowlist,
        }
    }

    fn section_allowed(&self, section: &str) -> bool {
        match &self.section_allowlist {
            None => true,
            Some(allowed) => allowed
                .iter()
                .any(|name| name.eq_ignore_ascii_case(section)),
        }
    }

    /// Run the full map-reduce pass and synthesize the comprehensive report.
    pub async fn summarize_filing(
        &self,
        ticker: &str,
        form_type: &str,
        sections: Vec<SectionChunks>,
    ) -> Result<FilingReport, SummaryError> {
        let eligible: Vec<SectionChunks> = sections
            .into_iter()
            .filter(|section| self.section_allowed(&section.section))
            .collect();
        if eligible.is_empty() {
            return Err(SummaryError::NoSections);
        }

        // Map phase: one shared permit pool across all sections.
        let map_permits = Arc::new(Semaphore::new(self.map_concurrency));
        let section_permits = Arc::new(Semaphore::new(self.section_concurrency));

        let section_futures = eligible.into_iter().map(|section| {
            let map_permits = Arc::clone(&map_permits);
            let section_permits = Arc::clone(&section_permits);
            async move {
                let chunk_summaries = self
                    .map_chunks(&section.section, section.chunks, map_permits)
                    .await;
                let _permit = section_permits
                    .acquire()
                    .await
                    .expect("section semaphore never closed");
                self.reduce_section(&section.section, chunk_summaries).await
            }
        });
        let section_summaries = join_all(section_futures).await;

        let named: Vec<(String, String)> = section_summaries
            .iter()
            .map(|summary| (summary.section.clone(), summary.summary.clone()))
            .collect();
        let report_prompt = prompts::build_report_prompt(ticker, form_type, &named);
        let body = complete_with_backoff(
            self.client.as_ref(),
            CompletionRequest {
                model: self.model.clone(),
                system: Some(prompts::ANALYST_SYSTEM.to_string()),
                prompt: report_prompt,
            },
        )
        .await
        .map_err(|error| SummaryError::ReportFailed(error.to_string()))?;

        tracing::info!(
            ticker,
            form_type,
            sections = section_summaries.len(),
            "Comprehensive report synthesized"
        );

        Ok(FilingReport {
            body,
            sections: section_summaries,
        })
    }

    async fn map_chunks(
        &self,
        section: &str,
        chunks: Vec<String>,
        permits: Arc<Semaphore>,
    ) -> Vec<String> {
        let futures = chunks.into_iter().enumerate().map(|(index, chunk)| {
            let permits = Arc::clone(&permits);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .expect("map semaphore never closed");
                let request = CompletionRequest {
                    model: self.model.clone(),
                    system: Some(prompts::ANALYST_SYSTEM.to_string()),
                    prompt: prompts::build_chunk_prompt(section, &chunk),
                };
                match complete_with_backoff(self.client.as_ref(), request).await {
                    Ok(summary) if !summary.trim().is_empty() => Some(summary),
                    Ok(_) => {
                        tracing::warn!(section, index, "Dropping empty chunk summary");
                        None
                    }
                    Err(error) => {
                        tracing::warn!(section, index, error = %error, "Dropping failed chunk summary");
                        None
                    }
                }
            }
        });
        join_all(futures).await.into_iter().flatten().collect()
    }

    async fn reduce_section(&self, section: &str, chunk_summaries: Vec<String>) -> SectionSummary {
        let used = chunk_summaries.len();
        if used == 0 {
            tracing::warn!(section, "No usable chunk summaries, recording placeholder");
            return SectionSummary {
                section: section.to_string(),
                summary: SECTION_PLACEHOLDER.to_string(),
                chunk_summaries_used: 0,
            };
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            system: Some(prompts::ANALYST_SYSTEM.to_string()),
            prompt: prompts::build_section_prompt(section, &chunk_summaries),
        };
        let summary = match complete_with_backoff(self.client.as_ref(), request).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) | Err(_) => {
                tracing::warn!(section, "Section reduce failed, recording placeholder");
                SECTION_PLACEHOLDER.to_string()
            }
        };

        SectionSummary {
            section: section.to_string(),
            summary,
            chunk_summaries_used: used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes a marker per call; fails when the prompt contains a poison token.
    struct StubClient {
        calls: AtomicUsize,
    }

    impl StubClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.prompt.contains("POISON") {
                return Err(CompletionError::GenerationFailed("poisoned".into()));
            }
            Ok(format!("summary({} chars)", request.prompt.len()))
        }
    }

    fn orchestrator(client: Arc<dyn CompletionClient>) -> SummaryOrchestrator {
        SummaryOrchestrator::new(client, "test-model".into(), 4, 3, None)
    }

    #[tokio::test]
    async fn partial_chunk_failures_do_not_fail_the_section() {
        let client = StubClient::new();
        let report = orchestrator(client.clone())
            .summarize_filing(
                "ACME",
                "10-K",
                vec![SectionChunks {
                    section: "Risk Factors".into(),
                    chunks: vec![
                        "good one".into(),
                        "POISON".into(),
                        "good two".into(),
                        "POISON".into(),
                        "good three".into(),
                    ],
                }],
            )
            .await
            .expect("report");

        assert_eq!(report.sections.len(), 1);
        let section = &report.sections[0];
        assert_eq!(section.chunk_summaries_used, 3);
        assert_ne!(section.summary, SECTION_PLACEHOLDER);
    }

    #[tokio::test]
    async fn all_failed_chunks_produce_placeholder_section() {
        let client = StubClient::new();
        let report = orchestrator(client.clone())
            .summarize_filing(
                "ACME",
                "10-K",
                vec![SectionChunks {
                    section: "Properties".into(),
                    chunks: vec!["POISON".into(), "POISON".into()],
                }],
            )
            .await
            .expect("report");

        let section = &report.sections[0];
        assert_eq!(section.summary, SECTION_PLACEHOLDER);
        assert_eq!(section.chunk_summaries_used, 0);
        // 2 failed map calls + 1 report call; the reduce call is skipped.
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn report_failure_is_fatal() {
        struct ReportPoison;
        #[async_trait]
        impl CompletionClient for ReportPoison {
            async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
                if request.prompt.contains("comprehensive analyst report") {
                    Err(CompletionError::GenerationFailed("no report".into()))
                } else {
                    Ok("fine".into())
                }
            }
        }

        let error = orchestrator(Arc::new(ReportPoison))
            .summarize_filing(
                "ACME",
                "10-K",
                vec![SectionChunks {
                    section: "Business".into(),
                    chunks: vec!["anvils".into()],
                }],
            )
            .await
            .expect_err("fatal");
        assert!(matches!(error, SummaryError::ReportFailed(_)));
    }

    #[tokio::test]
    async fn allowlist_restricts_sections() {
        let client = StubClient::new();
        let orchestrator = SummaryOrchestrator::new(
            client.clone(),
            "test-model".into(),
            4,
            3,
            Some(vec!["risk factors".into()]),
        );
        let report = orchestrator
            .summarize_filing(
                "ACME",
                "10-K",
                vec![
                    SectionChunks {
                        section: "Business".into(),
                        chunks: vec!["anvils".into()],
                    },
                    SectionChunks {
                        section: "Risk Factors".into(),
                        chunks: vec!["gravity".into()],
                    },
                ],
            )
            .await
            .expect("report");

        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].section, "Risk Factors");
    }

    #[tokio::test]
    async fn empty_eligible_set_is_an_error() {
        let orchestrator = SummaryOrchestrator::new(
            StubClient::new(),
            "test-model".into(),
            4,
            3,
            Some(vec!["MD&A".into()]),
        );
        let error = orchestrator
            .summarize_filing(
                "ACME",
                "10-K",
                vec![SectionChunks {
                    section: "Business".into(),
                    chunks: vec!["anvils".into()],
                }],
            )
            .await
            .expect_err("no sections");
        assert!(matches!(error, SummaryError::NoSections));
    }
}
