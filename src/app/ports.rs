use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A fetched document.
#[derive(Clone, Debug)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub body: String,
}

const CHALLENGE_MARKERS: &[&str] = &[
    "Request unsuccessful",
    "Incapsula incident",
    "_Incapsula_Resource",
    "Just a moment...",
    "cf-challenge",
    "challenge-platform",
    "Access Denied",
];

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Bot-protection interstitial served instead of the real page.
    pub fn looks_like_challenge(&self) -> bool {
        // Real listing pages can mention these words deep in the body.
        let head: String = self.body.chars().take(4000).collect();
        CHALLENGE_MARKERS.iter().any(|m| head.contains(m))
    }
}

/// A JSON response observed while a page loaded.
#[derive(Clone, Debug)]
pub struct CapturedResponse {
    pub url: String,
    pub body: Value,
}

/// Which in-page responses to keep during a single navigation.
#[derive(Clone, Debug, Default)]
pub struct ResponseFilter {
    url_contains: Vec<String>,
}

impl ResponseFilter {
    pub fn url_contains(needle: impl Into<String>) -> Self {
        Self { url_contains: vec![needle.into().to_lowercase()] }
    }

    pub fn or_url_contains(mut self, needle: impl Into<String>) -> Self {
        self.url_contains.push(needle.into().to_lowercase());
        self
    }

    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.url_contains.iter().any(|n| url.contains(n.as_str()))
    }
}

/// The page/session abstraction an extractor drives.
///
/// Owned by the orchestrator and lent to one extractor at a time.
#[async_trait]
pub trait PageSession: Send {
    async fn goto(&mut self, url: &str) -> Result<Page>;

    /// Navigate and collect matching JSON responses for this navigation only.
    async fn goto_capturing(
        &mut self,
        url: &str,
        filter: &ResponseFilter,
    ) -> Result<(Page, Vec<CapturedResponse>)>;

    /// Politeness delay between requests to the same site.
    async fn pause(&mut self, duration: Duration);
}

/// Counts returned by the ingestion endpoint for one batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl IngestOutcome {
    /// Accepts both `{created, ...}` and `{success, results: {created, ...}}`.
    pub fn from_body(body: &Value) -> Result<Self> {
        let counts = body.get("results").filter(|r| r.is_object()).unwrap_or(body);
        Ok(serde_json::from_value(counts.clone())?)
    }
}

#[async_trait]
pub trait IngestPort: Send + Sync {
    async fn submit(&self, events: &[Event]) -> Result<IngestOutcome>;
}
