use thiserror::Error;

/// Classification of a single failed upstream metrics call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("upstream rate limited the request")]
    RateLimited,
    #[error("transient upstream failure: {0}")]
    Transient(String),
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Only rate limiting is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::RateLimited => "rate_limited",
            FetchError::Transient(_) => "transient",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("entity listing failed: {0}")]
    TopLevelFailure(#[from] FetchError),
}
