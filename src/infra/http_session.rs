use crate::app::ports::{CapturedResponse, Page, PageSession, ResponseFilter};
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const MAX_CAPTURES: usize = 10;

/// Live page session over plain HTTP.
///
/// Response interception is realised by fetching the data endpoints a page
/// declares (preload hints and `data-*` endpoint attributes).
pub struct HttpPageSession {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageSession {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn fetch(&self, url: &str, accept: &str) -> Result<Page> {
        let request = async {
            let resp = self
                .client
                .get(url)
                .header(ACCEPT, accept)
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .send()
                .await?;
            let status = resp.status().as_u16();
            let final_url = resp.url().to_string();
            let body = resp.text().await?;
            Ok::<_, ScraperError>(Page { url: final_url, status, body })
        };
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ScraperError::Timeout { url: url.to_string(), ms: self.timeout.as_millis() as u64 }),
        }
    }
}

#[async_trait]
impl PageSession for HttpPageSession {
    #[instrument(skip(self))]
    async fn goto(&mut self, url: &str) -> Result<Page> {
        let page = self.fetch(url, HTML_ACCEPT).await?;
        debug!(status = page.status, bytes = page.body.len(), "Fetched page");
        Ok(page)
    }

    #[instrument(skip(self, filter))]
    async fn goto_capturing(
        &mut self,
        url: &str,
        filter: &ResponseFilter,
    ) -> Result<(Page, Vec<CapturedResponse>)> {
        let page = self.fetch(url, HTML_ACCEPT).await?;
        let endpoints: Vec<String> = discover_data_endpoints(&page.body, &page.url)
            .into_iter()
            .filter(|e| filter.matches(e))
            .take(MAX_CAPTURES)
            .collect();

        let mut captured = Vec::new();
        for endpoint in endpoints {
            match self.fetch(&endpoint, "application/json").await {
                Ok(resp) if resp.is_success() => match serde_json::from_str(&resp.body) {
                    Ok(body) => captured.push(CapturedResponse { url: endpoint, body }),
                    Err(e) => debug!("Ignoring non-JSON response from {}: {}", endpoint, e),
                },
                Ok(resp) => debug!("Ignoring {} response from {}", resp.status, endpoint),
                Err(e) => debug!("Data endpoint {} failed: {}", endpoint, e),
            }
        }
        Ok((page, captured))
    }

    async fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Absolute URLs of data endpoints a document declares.
pub fn discover_data_endpoints(html: &str, base: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = Url::parse(base).ok();
    let mut found: Vec<String> = Vec::new();

    let mut push = |raw: &str| {
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        let resolved = match &base {
            Some(b) => b.join(raw).ok().map(|u| u.to_string()),
            None => Url::parse(raw).ok().map(|u| u.to_string()),
        };
        if let Some(url) = resolved {
            if !found.contains(&url) {
                found.push(url);
            }
        }
    };

    let preload = Selector::parse(r#"link[rel="preload"][as="fetch"][href]"#).unwrap();
    for link in document.select(&preload) {
        if let Some(href) = link.value().attr("href") {
            push(href);
        }
    }

    let data_attrs = Selector::parse("[data-api], [data-endpoint], [data-url], [data-src]").unwrap();
    for el in document.select(&data_attrs) {
        for attr in ["data-api", "data-endpoint", "data-url", "data-src"] {
            if let Some(value) = el.value().attr(attr) {
                if value.contains("/api/") || value.ends_with(".json") || value.contains("json") {
                    push(value);
                }
            }
        }
    }
    found
}
