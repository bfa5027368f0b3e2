//! Vendor error-code classification.
//!
//! The vendor tags every API failure with an upper-snake-case code, with
//! sub-families expressed by a dotted suffix (`INVALID_PARAMETER.Malformed`).
//! Lookups therefore run twice: once against the full code, once against the
//! code stripped at the first dot, so new sub-family codes are covered
//! without a table change.

/// Codes that are always worth retrying, regardless of operation.
pub const RETRYABLE_CODES: &[&str] = &[
    "SERVICE_TEMPORARY_UNAVAILABLE",
    "INTERNAL_SERVER_ERROR",
    "REQUEST_TIMED_OUT",
];

/// The generic not-found code shared by all services.
pub const CODE_RESOURCE_NOT_FOUND: &str = "OPERATION_FAILED_RESOURCE_NOT_FOUND";

/// Certificate deletion refused while an accelerator still references it.
pub const CODE_CERTIFICATE_IS_USING: &str = "CERTIFICATE_IS_USING";

/// Detach refused because the disk is not attached; treated as already done.
pub const CODE_DISK_NO_ATTACH: &str = "UNSUPPORTED_OPERATION_DISK_NO_ATTACH";

/// Coarse classification of a vendor or transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: throttling, 5xx, timeouts, network failures.
    TransientService,
    /// The referenced object does not exist (or is already released).
    NotFound,
    /// The request was malformed or violated a precondition.
    InvalidArgument,
    /// The object is still referenced by another resource.
    ResourceInUse,
    /// Credentials rejected.
    Auth,
    /// Everything else; surfaced verbatim.
    Other,
}

/// Implemented by error types that may carry a vendor code.
pub trait VendorFault {
    /// The vendor error code, if the failure came from the API.
    fn vendor_code(&self) -> Option<&str>;

    /// True for transport-level failures (connect, TLS, timeouts).
    fn is_network(&self) -> bool;
}

/// Strip a dotted sub-family suffix: `INVALID_PARAMETER.Malformed` →
/// `INVALID_PARAMETER`.
pub fn code_family(code: &str) -> &str {
    match code.find('.') {
        Some(idx) => &code[..idx],
        None => code,
    }
}

fn matches_code(code: &str, candidate: &str) -> bool {
    code == candidate || code_family(code) == candidate
}

/// Whether `code` belongs to the retryable set, or to `extra`.
pub fn code_is_retryable(code: &str, extra: &[&str]) -> bool {
    RETRYABLE_CODES
        .iter()
        .chain(extra.iter())
        .any(|c| matches_code(code, c))
}

/// Not-found family: the generic operation-failed code plus the per-resource
/// `INVALID_<KIND>_NOT_FOUND` codes.
pub fn code_is_not_found(code: &str) -> bool {
    let family = code_family(code);
    family == CODE_RESOURCE_NOT_FOUND
        || (family.starts_with("INVALID_") && family.ends_with("_NOT_FOUND"))
}

/// Recycled family: `OPERATION_DENIED_<KIND>_RECYCLED`, raised when a
/// terminate is issued against an object already in the recycle bin.
pub fn code_is_recycled(code: &str) -> bool {
    let family = code_family(code);
    family.starts_with("OPERATION_DENIED_") && family.ends_with("_RECYCLED")
}

/// Classify a failure into the coarse taxonomy.
pub fn classify<E: VendorFault>(err: &E) -> ErrorClass {
    if err.is_network() {
        return ErrorClass::TransientService;
    }
    let Some(code) = err.vendor_code() else {
        return ErrorClass::Other;
    };
    let class = if code_is_retryable(code, &[]) {
        ErrorClass::TransientService
    } else if code_is_not_found(code) {
        ErrorClass::NotFound
    } else if matches_code(code, CODE_CERTIFICATE_IS_USING) {
        ErrorClass::ResourceInUse
    } else {
        match code_family(code) {
            "AUTHFAILURE" | "UNAUTHORIZED_OPERATION" => ErrorClass::Auth,
            f if f.starts_with("INVALID_PARAMETER") || f.starts_with("MISSING_PARAMETER") => {
                ErrorClass::InvalidArgument
            }
            _ => ErrorClass::Other,
        }
    };
    tracing::info!(code, ?class, "classified vendor error");
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        code: Option<&'static str>,
        network: bool,
    }

    impl VendorFault for Fake {
        fn vendor_code(&self) -> Option<&str> {
            self.code
        }
        fn is_network(&self) -> bool {
            self.network
        }
    }

    fn api(code: &'static str) -> Fake {
        Fake {
            code: Some(code),
            network: false,
        }
    }

    #[test]
    fn dotted_prefix_falls_back_to_family() {
        assert!(code_is_retryable("INTERNAL_SERVER_ERROR.Database", &[]));
        assert!(!code_is_retryable("INTERNAL_SERVER", &[]));
    }

    #[test]
    fn extra_codes_extend_the_retry_set() {
        assert!(!code_is_retryable("OPERATION_FAILED_CONFLICT", &[]));
        assert!(code_is_retryable(
            "OPERATION_FAILED_CONFLICT",
            &["OPERATION_FAILED_CONFLICT"]
        ));
    }

    #[test]
    fn not_found_family() {
        assert!(code_is_not_found("OPERATION_FAILED_RESOURCE_NOT_FOUND"));
        assert!(code_is_not_found("INVALID_EIP_NOT_FOUND"));
        assert!(code_is_not_found("INVALID_INSTANCE_NOT_FOUND.Released"));
        assert!(!code_is_not_found("INVALID_PARAMETER_VALUE"));
    }

    #[test]
    fn recycled_family() {
        assert!(code_is_recycled("OPERATION_DENIED_INSTANCE_RECYCLED"));
        assert!(!code_is_recycled("OPERATION_DENIED_INSTANCE_BUSY"));
    }

    #[test]
    fn network_errors_are_transient() {
        let e = Fake {
            code: None,
            network: true,
        };
        assert_eq!(classify(&e), ErrorClass::TransientService);
    }

    #[test]
    fn certificate_in_use_is_terminal_in_use() {
        assert_eq!(classify(&api("CERTIFICATE_IS_USING")), ErrorClass::ResourceInUse);
    }

    #[test]
    fn auth_and_invalid_argument() {
        assert_eq!(classify(&api("AUTHFAILURE.TokenExpired")), ErrorClass::Auth);
        assert_eq!(
            classify(&api("INVALID_PARAMETER_VALUE.Range")),
            ErrorClass::InvalidArgument
        );
    }
}
