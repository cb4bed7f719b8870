use wecred_core::{ApiError, CredentialError};

/// Errors that can occur when calling an API through the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The API answered with a non-zero `errcode`.
    #[error("{0}")]
    Api(ApiError),

    /// The API rejected the attached credential.
    ///
    /// Raised inside the pipeline to trigger a single renew-and-retry;
    /// callers only see it if no retry stage is installed.
    #[error("credential rejected: {0}")]
    CredentialRejected(ApiError),

    /// The credential was rejected and the renewal or the retried call failed too.
    #[error("{primary} (retry failed: {retry})")]
    RetryFailed {
        primary: ApiError,
        retry: Box<ClientError>,
    },

    /// Obtaining or renewing the credential failed.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// The HTTP status was outside the 2xx range.
    #[error("HTTP request failed with status code: {status}")]
    Status { status: u16 },

    /// A JSON response body could not be decoded.
    #[error("failed to decode response: {message}")]
    Decode { message: String },

    /// The request target could not be turned into an absolute URL.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The credential cannot be carried in the configured header.
    #[error("credential is not a valid value for header {name}")]
    InvalidHeader { name: String },

    /// Network or protocol failure below the API layer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request body could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The call did not finish before its deadline.
    #[error("request timed out")]
    Timeout,
}

impl ClientError {
    /// The upstream code most relevant to this failure, if any.
    ///
    /// For [`ClientError::RetryFailed`] this is the code of the first
    /// attempt; the retry's own code is available through
    /// [`retry_error`](Self::retry_error).
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api(e) | Self::CredentialRejected(e) => Some(e.code),
            Self::RetryFailed { primary, .. } => Some(primary.code),
            Self::Credential(e) => e.api_code(),
            _ => None,
        }
    }

    /// The failure of the retry attempt, for [`ClientError::RetryFailed`].
    pub fn retry_error(&self) -> Option<&ClientError> {
        match self {
            Self::RetryFailed { retry, .. } => Some(retry),
            _ => None,
        }
    }

    /// Drop the retry marker so the error is reported as a plain API error.
    pub(crate) fn settle(self) -> Self {
        match self {
            Self::CredentialRejected(e) => Self::Api(e),
            other => other,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
