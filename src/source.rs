//! Retrieval of raw filing documents from the upstream source.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Errors surfaced while fetching a filing document.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream source could not be reached.
    #[error("Filing source unavailable: {0}")]
    SourceUnavailable(String),
    /// The source responded but the requested filing does not exist.
    #[error("Filing not found: {ticker}/{accession}")]
    NotFound {
        /// Ticker the lookup used.
        ticker: String,
        /// Accession the lookup used.
        accession: String,
    },
    /// The source returned an unexpected error response.
    #[error("Filing fetch failed: {0}")]
    FetchFailed(String),
}

/// Interface implemented by filing document providers.
#[async_trait]
pub trait FilingSource: Send + Sync {
    /// Fetch the full plain text of a filing.
    async fn fetch_filing(&self, ticker: &str, accession: &str) -> Result<String, SourceError>;
}

/// HTTP-backed source that fetches filing text from a configured base URL.
pub struct HttpFilingSource {
    http: Client,
    base_url: String,
}

impl HttpFilingSource {
    /// Create a source against the given base URL.
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .user_agent("filing-digest/source")
            .build()
            .expect("Failed to construct reqwest::Client for filing source");
        Self { http, base_url }
    }

    fn endpoint(&self, ticker: &str, accession: &str) -> String {
        format!(
            "{}/{ticker}/{accession}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl FilingSource for HttpFilingSource {
    async fn fetch_filing(&self, ticker: &str, accession: &str) -> Result<String, SourceError> {
        let response = self
            .http
            .get(self.endpoint(ticker, accession))
            .send()
            .await
            .map_err(|error| {
                SourceError::SourceUnavailable(format!(
                    "failed to reach filing source at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                ticker: ticker.to_string(),
                accession: accession.to_string(),
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::FetchFailed(format!(
                "filing source returned {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|error| SourceError::FetchFailed(format!("failed to read filing body: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    #[tokio::test]
    async fn fetches_filing_text() {
        let server = MockServer::start_async().await;
        let source = HttpFilingSource::new(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ACME/0000123-24-000001");
                then.status(200).body("PART I\nItem 1. Business\nWe make anvils.");
            })
            .await;

        let text = source
            .fetch_filing("ACME", "0000123-24-000001")
            .await
            .expect("filing text");
        mock.assert();
        assert!(text.contains("anvils"));
    }

    #[tokio::test]
    async fn missing_filing_maps_to_not_found() {
        let server = MockServer::start_async().await;
        let source = HttpFilingSource::new(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(GET).path("/ACME/missing");
                then.status(404);
            })
            .await;

        let error = source
            .fetch_filing("ACME", "missing")
            .await
            .expect_err("not found");
        assert!(matches!(error, SourceError::NotFound { .. }));
    }
}
