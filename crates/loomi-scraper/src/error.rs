use thiserror::Error;

/// Failure to fetch one page, classified by whether retrying can help.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, 5xx, or 429. Retried.
    #[error("transient failure fetching {url}: {reason}")]
    Transient {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// 4xx other than 429, or a URL that cannot be requested. Not retried.
    #[error("permanent failure fetching {url}: {reason}")]
    Permanent { url: String, reason: String },

    /// The request or page navigation did not finish in time. Retried.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The browser engine could not be started.
    #[error("browser engine failed to launch: {reason}")]
    EngineLaunch { reason: String },
}

impl FetchError {
    /// Returns `true` when the same request may succeed if tried again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::Timeout { .. })
    }

    /// Classifies a `reqwest` transport error for `url`.
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_builder() {
            FetchError::Permanent {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Transient {
                url: url.to_string(),
                status: err.status().map(|s| s.as_u16()),
                reason: err.to_string(),
            }
        }
    }

    /// Classifies a non-success HTTP status for `url`.
    pub(crate) fn from_status(url: &str, status: u16) -> Self {
        if status == 429 || status >= 500 {
            FetchError::Transient {
                url: url.to_string(),
                status: Some(status),
                reason: format!("HTTP {status}"),
            }
        } else {
            FetchError::Permanent {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            }
        }
    }
}

/// Failure of a site extraction function on one product page.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no product data found on {url}")]
    NoProductData { url: String },

    #[error("invalid embedded JSON on {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("extractor panicked on {url}: {reason}")]
    Panicked { url: String, reason: String },
}

/// Why one strategy attempt against a site failed.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no product links found across {collections} collection page(s)")]
    NoProductLinks { collections: usize },

    #[error("all {attempted} product page(s) failed")]
    AllProductsFailed { attempted: usize },
}

/// Errors that stop a run before any strategy is attempted, or while writing output.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown extractor \"{name}\" (registered: {available})")]
    UnknownExtractor { name: String, available: String },
}
