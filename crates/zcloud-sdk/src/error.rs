//! SDK error types.

use thiserror::Error;
use zcloud_core::classify::{code_is_not_found, code_is_recycled, VendorFault};

#[derive(Debug, Error)]
pub enum SdkError {
    /// The API answered with an error envelope.
    #[error("api error {code}: {message} (request id {request_id})")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    /// Transport-level failure (connect, TLS, read timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The envelope was missing its response payload.
    #[error("empty response for action {0}")]
    MissingResponse(String),

    /// A call the mock transport was not primed for (test use only).
    #[error("unexpected call to {0}")]
    UnexpectedCall(String),
}

impl SdkError {
    /// The vendor error code, if the failure came from the API.
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the failure is the vendor's not-found family.
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(code_is_not_found)
    }

    /// Whether the failure reports the object as already recycled.
    pub fn is_recycled(&self) -> bool {
        self.code().is_some_and(code_is_recycled)
    }

    /// Whether the failure carries the exact vendor code (dotted sub-family
    /// codes match their family).
    pub fn is_code(&self, candidate: &str) -> bool {
        self.code()
            .is_some_and(|c| c == candidate || zcloud_core::classify::code_family(c) == candidate)
    }
}

impl VendorFault for SdkError {
    fn vendor_code(&self) -> Option<&str> {
        self.code()
    }

    fn is_network(&self) -> bool {
        match self {
            SdkError::Transport(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: &str) -> SdkError {
        SdkError::Api {
            code: code.to_string(),
            message: "m".to_string(),
            request_id: "req-1".to_string(),
        }
    }

    #[test]
    fn code_helpers() {
        assert!(api("INVALID_DISK_NOT_FOUND").is_not_found());
        assert!(api("OPERATION_DENIED_INSTANCE_RECYCLED").is_recycled());
        assert!(api("CERTIFICATE_IS_USING").is_code("CERTIFICATE_IS_USING"));
        assert!(api("CERTIFICATE_IS_USING.Bound").is_code("CERTIFICATE_IS_USING"));
        assert!(!api("CERTIFICATE_IS_USING").is_not_found());
    }
}
