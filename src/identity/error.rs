use thiserror::Error;

/// Failures while talking to the identity provider on behalf of a caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing bearer token")]
    MissingBearerToken,
    #[error("Invalid user token")]
    InvalidUserToken,
    #[error("Failed to obtain management token")]
    ManagementToken { details: String },
    #[error("Failed to create verification job")]
    VerificationJob { details: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid identity provider URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Upstream response body attached to the error, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::ManagementToken { details } | Self::VerificationJob { details } => Some(details),
            _ => None,
        }
    }
}
