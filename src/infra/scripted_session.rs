//! Offline page session that serves recorded documents.
//!
//! Each URL holds a queue of responses; the last one repeats once the queue
//! is drained. Pauses are recorded, never slept.

use crate::app::ports::{CapturedResponse, Page, PageSession, ResponseFilter};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
enum Recorded {
    Page { status: u16, body: String },
    Timeout,
    Failure(String),
}

#[derive(Default)]
pub struct ScriptedSession {
    responses: HashMap<String, VecDeque<Recorded>>,
    captures: HashMap<String, Vec<CapturedResponse>>,
    visits: Vec<String>,
    pauses: Vec<Duration>,
}

fn key(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// On-disk layout for `ScriptedSession::from_dir`.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    pages: Vec<ManifestPage>,
    #[serde(default)]
    captures: Vec<ManifestCapture>,
}

#[derive(Debug, Deserialize)]
struct ManifestPage {
    url: String,
    #[serde(default = "default_status")]
    status: u16,
    file: String,
}

#[derive(Debug, Deserialize)]
struct ManifestCapture {
    page: String,
    url: String,
    file: String,
}

fn default_status() -> u16 {
    200
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a recording directory described by its `manifest.json`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(dir.join("manifest.json"))?)?;
        let mut session = Self::new();
        for page in manifest.pages {
            let body = fs::read_to_string(dir.join(&page.file))?;
            session = session.with_status(&page.url, page.status, body);
        }
        for capture in manifest.captures {
            let body: Value = serde_json::from_str(&fs::read_to_string(dir.join(&capture.file))?)?;
            session = session.with_capture(&capture.page, &capture.url, body);
        }
        debug!("Loaded {} recorded urls from {}", session.responses.len(), dir.display());
        Ok(session)
    }

    fn push(mut self, url: &str, recorded: Recorded) -> Self {
        self.responses.entry(key(url)).or_default().push_back(recorded);
        self
    }

    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.push(url, Recorded::Page { status, body: body.into() })
    }

    pub fn with_timeout(self, url: &str) -> Self {
        self.push(url, Recorded::Timeout)
    }

    /// A navigation that fails outright, e.g. a DNS error.
    pub fn with_failure(self, url: &str, message: impl Into<String>) -> Self {
        self.push(url, Recorded::Failure(message.into()))
    }

    /// A JSON response observed while `page_url` loads.
    pub fn with_capture(mut self, page_url: &str, response_url: &str, body: Value) -> Self {
        self.captures
            .entry(key(page_url))
            .or_default()
            .push(CapturedResponse { url: response_url.to_string(), body });
        self
    }

    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }

    fn next(&mut self, url: &str) -> Result<Page> {
        self.visits.push(url.to_string());
        let queue = self
            .responses
            .get_mut(&key(url))
            .ok_or_else(|| ScraperError::NotRecorded(url.to_string()))?;
        let recorded = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        match recorded {
            Some(Recorded::Page { status, body }) => Ok(Page { url: url.to_string(), status, body }),
            Some(Recorded::Timeout) => Err(ScraperError::Timeout { url: url.to_string(), ms: 0 }),
            Some(Recorded::Failure(message)) => Err(ScraperError::Api { message }),
            None => Err(ScraperError::NotRecorded(url.to_string())),
        }
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn goto(&mut self, url: &str) -> Result<Page> {
        self.next(url)
    }

    async fn goto_capturing(
        &mut self,
        url: &str,
        filter: &ResponseFilter,
    ) -> Result<(Page, Vec<CapturedResponse>)> {
        let page = self.next(url)?;
        let captured = self
            .captures
            .get(&key(url))
            .map(|all| all.iter().filter(|c| filter.matches(&c.url)).cloned().collect())
            .unwrap_or_default();
        Ok((page, captured))
    }

    async fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn last_response_repeats() {
        let mut s = ScriptedSession::new().with_status("https://a.test/", 503, "busy").with_page("https://a.test", "ok");
        assert_eq!(s.goto("https://a.test").await.unwrap().status, 503);
        assert_eq!(s.goto("https://a.test/").await.unwrap().body, "ok");
        assert_eq!(s.goto("https://a.test/").await.unwrap().body, "ok");
        assert_eq!(s.visits().len(), 3);
    }

    #[tokio::test]
    async fn unknown_urls_fail() {
        let mut s = ScriptedSession::new();
        assert!(matches!(s.goto("https://nowhere.test").await, Err(ScraperError::NotRecorded(_))));
    }

    #[tokio::test]
    async fn captures_are_filtered_per_navigation() {
        let mut s = ScriptedSession::new()
            .with_page("https://a.test/events", "<html></html>")
            .with_capture("https://a.test/events", "https://a.test/api/events", json!([{"Title": "X"}]))
            .with_capture("https://a.test/events", "https://a.test/api/menu", json!([]));
        let (_, captured) = s
            .goto_capturing("https://a.test/events", &ResponseFilter::url_contains("event"))
            .await
            .unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].url, "https://a.test/api/events");
    }

    #[test]
    fn loads_recording_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("listing.html"), "<html>listing</html>").unwrap();
        fs::write(dir.path().join("events.json"), r#"{"events": []}"#).unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{
                "pages": [{"url": "https://a.test/events", "file": "listing.html"}],
                "captures": [{"page": "https://a.test/events", "url": "https://a.test/api/events", "file": "events.json"}]
            }"#,
        )
        .unwrap();
        let s = ScriptedSession::from_dir(dir.path()).unwrap();
        assert_eq!(s.responses.len(), 1);
        assert_eq!(s.captures[&key("https://a.test/events")].len(), 1);
    }
}
