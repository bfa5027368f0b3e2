//! Provider error types.

use thiserror::Error;
use zcloud_core::retry::RetryError;
use zcloud_core::validate::ValidationError;
use zcloud_core::waiter::WaitError;
use zcloud_sdk::SdkError;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// A required attribute is absent from the desired state.
    #[error("missing required argument {0}")]
    MissingArgument(&'static str),

    /// An attribute is present but violates a precondition.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// Cross-field validation failure, surfaced before any API call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The API rejected the request.
    #[error(transparent)]
    Api(#[from] SdkError),

    /// A resource is in a state the requested operation cannot start from.
    #[error("{resource} status is illegal {status}")]
    IllegalStatus { resource: &'static str, status: String },

    /// The object is still referenced and cannot be deleted.
    #[error("{resource} {id} is still in use: {reason}")]
    InUse {
        resource: &'static str,
        id: String,
        reason: String,
    },

    /// A retry loop gave up at its deadline.
    #[error("operation timed out: {0}")]
    RetryTimeout(String),

    /// A state wait failed or timed out.
    #[error("waiting for {resource}: {reason}")]
    Wait { resource: &'static str, reason: String },

    /// Malformed resource identifier.
    #[error(transparent)]
    Id(#[from] zcloud_core::ids::IdError),

    /// Failure writing a data-source output file.
    #[error("failed to write output file {path}: {source}")]
    OutputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure encoding observed state.
    #[error("failed to encode state: {0}")]
    State(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ProviderError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    /// The vendor said not-found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::Api(e) if e.is_not_found())
    }
}

impl From<RetryError<SdkError>> for ProviderError {
    fn from(err: RetryError<SdkError>) -> Self {
        match err {
            RetryError::Terminal(e) => ProviderError::Api(e),
            e @ RetryError::DeadlineExceeded { .. } => ProviderError::RetryTimeout(e.to_string()),
        }
    }
}

/// Attach a resource label to a wait failure.
pub fn wait_error(resource: &'static str, err: WaitError<SdkError>) -> ProviderError {
    match err {
        WaitError::Refresh(e) => ProviderError::Api(e),
        other => ProviderError::Wait {
            resource,
            reason: other.to_string(),
        },
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
