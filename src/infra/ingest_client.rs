use crate::app::ports::{IngestOutcome, IngestPort};
use crate::error::{Result, ScraperError};
use crate::types::Event;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

/// Posts event batches to the ingestion endpoint.
pub struct HttpIngestClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpIngestClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IngestPort for HttpIngestClient {
    #[instrument(skip(self, events), fields(batch = events.len()))]
    async fn submit(&self, events: &[Event]) -> Result<IngestOutcome> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(events)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ScraperError::Ingest { status: status.as_u16(), body: truncate(&body, 500) });
        }

        debug!(status = status.as_u16(), "Batch accepted");
        if body.trim().is_empty() {
            return Ok(IngestOutcome::default());
        }
        IngestOutcome::from_body(&serde_json::from_str(&body)?)
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
