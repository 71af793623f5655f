use citesync_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {url}: HTTP {status}: {body}")]
    ApiError {
        url: String,
        status: u16,
        body: String,
    },

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported identifier for {source_name}: {identifier}")]
    Unsupported {
        source_name: String,
        identifier: String,
    },

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ResolveError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode() && !e.is_builder(),
            Self::ApiError { status, .. } => *status >= 500 || *status == 408,
            Self::RateLimit(..) | Self::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Accept `value` only when it is a number in `[0, 1]`. NaN is rejected.
pub(crate) fn unit_interval(name: &str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ResolveError::ContractViolation(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}
