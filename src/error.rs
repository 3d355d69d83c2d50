use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Navigation to {url} timed out after {ms} ms")]
    Timeout { url: String, ms: u64 },

    #[error("Blocked by {url} with status {status}")]
    Blocked { url: String, status: u16 },

    #[error("Bot challenge served by {url}")]
    Challenge { url: String },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted { url: String, attempts: u32, last: String },

    #[error("Ingestion endpoint returned {status}: {body}")]
    Ingest { status: u16, body: String },

    #[error("No recorded page for {0}")]
    NotRecorded(String),
}

impl ScraperError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScraperError::Timeout { .. }
            | ScraperError::Blocked { .. }
            | ScraperError::Challenge { .. } => true,
            ScraperError::Ingest { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
