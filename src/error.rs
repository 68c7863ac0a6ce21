use thiserror::Error;

pub const FALLBACK_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected our credentials. The session has already been
    /// cleared by the time a caller sees this.
    #[error("Session expired. Please login again.")]
    Unauthorized,

    /// As `Unauthorized`, but the stored token could not be removed and will
    /// be offered again on the next start.
    #[error("Session expired, but the saved session could not be removed ({0}). Please login again.")]
    StaleSession(String),

    /// A required field was missing; no request was sent.
    #[error("{0}")]
    Validation(String),

    /// The board's worker never received the request.
    #[error("{0}")]
    NotSent(&'static str),

    #[error("{message} (HTTP {status})")]
    Remote { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
