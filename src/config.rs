use crate::error::{Result, ScraperError};
use crate::pipeline::retry::RetryPolicy;
use crate::types::ExtractContext;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_WEBHOOK_URL: &str = "https://conferix.com/.netlify/functions/receive-events";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scrapers: BTreeMap<String, ScraperToggle>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub delay_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub extractor_pause_ms: u64,
    pub detail_pause_ms: u64,
    pub max_load_more: u32,
    pub max_detail_pages: usize,
    pub output_dir: Option<String>,
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperToggle {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

fn default_webhook_url() -> String {
    DEFAULT_WEBHOOK_URL.to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000, user_agent: DEFAULT_USER_AGENT.to_string() }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { size: 50, delay_ms: 2000, max_attempts: 1 }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            extractor_pause_ms: 1000,
            detail_pause_ms: 1500,
            max_load_more: 10,
            max_detail_pages: 60,
            output_dir: None,
            log_dir: "logs".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 5000 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: default_webhook_url(),
            browser: BrowserConfig::default(),
            batch: BatchConfig::default(),
            run: RunConfig::default(),
            retry: RetryConfig::default(),
            scrapers: BTreeMap::new(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Upper bound on batch retries so a dead endpoint cannot stall a run.
const MAX_BATCH_ATTEMPTS: u32 = 5;

impl Config {
    /// Read `path`, apply `.env` and process environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        dotenv::dotenv().ok();
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Environment overrides: `WEBHOOK_URL`, `SCRAPER_BATCH_SIZE`,
    /// `SCRAPER_BATCH_DELAY_MS`, `SCRAPER_TIMEOUT_MS`, `SCRAPER_METRICS_PORT`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEBHOOK_URL").filter(|v| !v.trim().is_empty()) {
            self.webhook_url = url.trim().to_string();
        }
        if let Some(v) = lookup("SCRAPER_BATCH_SIZE") {
            self.batch.size = parse_number("SCRAPER_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_BATCH_DELAY_MS") {
            self.batch.delay_ms = parse_number("SCRAPER_BATCH_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_TIMEOUT_MS") {
            self.browser.timeout_ms = parse_number("SCRAPER_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_METRICS_PORT") {
            self.metrics.port = Some(parse_number("SCRAPER_METRICS_PORT", &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.size == 0 {
            return Err(ScraperError::Config("batch.size must be at least 1".into()));
        }
        if self.browser.timeout_ms == 0 {
            return Err(ScraperError::Config("browser.timeout_ms must be at least 1".into()));
        }
        let url = Url::parse(&self.webhook_url)
            .map_err(|e| ScraperError::Config(format!("webhook_url '{}' is invalid: {}", self.webhook_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScraperError::Config(format!("webhook_url must be http(s), got '{}'", url.scheme())));
        }
        Ok(())
    }

    /// Sites missing from `[scrapers]` are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.scrapers.get(name).map_or(false, |s| s.enabled)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.timeout_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch.delay_ms)
    }

    pub fn extractor_pause(&self) -> Duration {
        Duration::from_millis(self.run.extractor_pause_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_millis(self.retry.base_delay_ms))
    }

    pub fn batch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.batch.max_attempts.min(MAX_BATCH_ATTEMPTS),
            Duration::from_millis(self.batch.delay_ms),
        )
    }

    pub fn extract_context(&self) -> ExtractContext {
        ExtractContext {
            retry: self.retry_policy(),
            detail_pause: Duration::from_millis(self.run.detail_pause_ms),
            max_load_more: self.run.max_load_more,
            max_detail_pages: self.run.max_detail_pages,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScraperError::Config(format!("{key} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
        webhook_url = "https://example.test/receive"

        [batch]
        size = 25

        [scrapers.difc]
        enabled = true

        [scrapers.dmg]
        enabled = false
    "#;

    #[test]
    fn fills_defaults_for_missing_sections() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.batch.size, 25);
        assert_eq!(config.batch.delay_ms, 2000);
        assert_eq!(config.browser.timeout_ms, 30_000);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.run.output_dir.is_none());
    }

    #[test]
    fn enable_flags() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert!(config.is_enabled("difc"));
        assert!(!config.is_enabled("dmg"));
        assert!(!config.is_enabled("meetup"));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let env: HashMap<&str, &str> =
            [("WEBHOOK_URL", "https://override.test/hook"), ("SCRAPER_BATCH_SIZE", "10")].into_iter().collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.webhook_url, "https://override.test/hook");
        assert_eq!(config.batch.size, 10);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        assert!(config.apply_overrides(|k| (k == "SCRAPER_BATCH_SIZE").then(|| "many".to_string())).is_err());

        config.batch.size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.webhook_url = "ftp://example.test".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_retries_are_bounded() {
        let mut config = Config::default();
        config.batch.max_attempts = 100;
        assert_eq!(config.batch_retry_policy().max_attempts, 5);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.is_enabled("difc"));
        assert!(Config::load("/definitely/missing.toml").is_err());
    }
}
