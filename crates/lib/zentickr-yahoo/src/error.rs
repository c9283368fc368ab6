use thiserror::Error;
use zentickr_core::ProviderError;

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Api(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    #[error("failed to acquire session: {0}")]
    Session(String),
    #[error("{0}")]
    MissingData(String),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl YahooError {
    pub(crate) fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }

    /// Whether Yahoo refused the session crumb.
    #[must_use]
    pub fn is_rejected_session(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::Api(message) => message.to_ascii_lowercase().contains("invalid crumb"),
            _ => false,
        }
    }
}

impl From<YahooError> for ProviderError {
    fn from(err: YahooError) -> Self {
        Self::new(err.to_string())
    }
}
