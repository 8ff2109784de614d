use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} rejected the credentials ({status})")]
    Rejected {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("invalid response body from {endpoint}: {source}")]
    Body {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed user profile: {0}")]
    MalformedProfile(#[from] serde_json::Error),
    #[error("token has no refresh token")]
    MissingRefreshToken,
}

impl Error {
    /// Whether retrying with the same credentials can never succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::MissingRefreshToken)
    }
}
