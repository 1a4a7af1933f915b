use thiserror::Error;

/// Errors surfaced by the loader.
///
/// Every failure is returned to the caller of [`crate::client::EiaClient`];
/// nothing is logged-and-continued.
#[derive(Error, Debug)]
pub enum EiaError {
    /// Malformed facets, inverted or mixed ranges, zero sizes. Raised before any request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The probe or the assembled frame has no rows.
    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("transport failure for {url}: {reason}")]
    TransportFailure {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("type mismatch in column '{column}' at row {row}: {reason}")]
    TypeMismatch {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl EiaError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EiaError::InvalidArgument(msg.into())
    }

    /// Connection errors, 429 and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            EiaError::TransportFailure { status: None, .. } => true,
            EiaError::TransportFailure {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EiaError>;
