//! Bounded retry with linearly growing backoff.

use crate::app::ports::{CapturedResponse, Page, PageSession, ResponseFilter};
use crate::error::{Result, ScraperError};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(5000) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Wait after the given failed attempt (1-based): `base * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Status codes sites answer with when rate limiting or blocking a client.
const BLOCKING_STATUSES: &[u16] = &[403, 429, 503];

fn check_page(page: &Page) -> Option<ScraperError> {
    if BLOCKING_STATUSES.contains(&page.status) {
        Some(ScraperError::Blocked { url: page.url.clone(), status: page.status })
    } else if page.looks_like_challenge() {
        Some(ScraperError::Challenge { url: page.url.clone() })
    } else if !page.is_success() {
        Some(ScraperError::Status { url: page.url.clone(), status: page.status })
    } else {
        None
    }
}

/// Navigate, retrying blocks, bot challenges, timeouts and connection errors.
///
/// Backoff waits go through [`PageSession::pause`]. Once attempts run out the
/// error is [`ScraperError::RetriesExhausted`].
pub async fn navigate_with_retry(
    page: &mut dyn PageSession,
    url: &str,
    policy: &RetryPolicy,
) -> Result<Page> {
    navigate_inner(page, url, policy, None).await.map(|(p, _)| p)
}

/// Like [`navigate_with_retry`], collecting matching responses of the
/// successful navigation.
pub async fn capture_with_retry(
    page: &mut dyn PageSession,
    url: &str,
    filter: &ResponseFilter,
    policy: &RetryPolicy,
) -> Result<(Page, Vec<CapturedResponse>)> {
    navigate_inner(page, url, policy, Some(filter)).await
}

async fn navigate_inner(
    page: &mut dyn PageSession,
    url: &str,
    policy: &RetryPolicy,
    filter: Option<&ResponseFilter>,
) -> Result<(Page, Vec<CapturedResponse>)> {
    let max = policy.max_attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=max {
        let outcome = match filter {
            Some(f) => page.goto_capturing(url, f).await,
            None => page.goto(url).await.map(|p| (p, Vec::new())),
        };

        match outcome {
            Ok((doc, captured)) => match check_page(&doc) {
                None => return Ok((doc, captured)),
                Some(e) if e.is_retryable() => last = e.to_string(),
                Some(e) => return Err(e),
            },
            Err(e) if e.is_retryable() => last = e.to_string(),
            Err(e) => return Err(e),
        }

        if attempt < max {
            let delay = policy.delay_for(attempt);
            warn!("Attempt {}/{} for {} failed: {}. Retrying after {:?}", attempt, max, url, last, delay);
            page.pause(delay).await;
        }
    }

    error!("Giving up on {} after {} attempts: {}", url, max, last);
    Err(ScraperError::RetriesExhausted { url: url.to_string(), attempts: max, last })
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// Only [`ScraperError::is_retryable`] errors are retried. Each wait is the
/// linear delay with ±25% jitter.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max && e.is_retryable() => {
                let delay = jittered(policy.delay_for(attempt));
                warn!("{} attempt {}/{} failed: {}. Retrying after {:?}", label, attempt, max, e, delay);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor = 0.75 + rand::random::<f64>() * 0.5;
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}
