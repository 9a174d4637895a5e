//! Error types and result alias for the signing pipeline.

use thiserror::Error;

/// Result type for signing operations
pub type SignResult<T> = Result<T, SignError>;

/// Closed set of failure kinds surfaced by the signing pipeline.
///
/// Every phase is fail-fast: the first error aborts the current phase and
/// reaches the caller unchanged. Partial output (a half-written destination
/// file) is not rolled back.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SignError {
    #[error("invalid or missing '{0}' value")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("a signature named '{0}' is already present - not replacing it")]
    AlreadyExists(String),

    #[error("i/o failure on '{path}': {source}")]
    IoFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed PDF: {0}")]
    PdfMalformed(String),

    #[error("cryptographic failure: {0}")]
    CryptoFailure(String),

    #[error("unable to write PKCS#7 data: not enough space (need {needed} hex chars, reserved {reserved})")]
    PlaceholderTooSmall { needed: usize, reserved: usize },

    #[error("base64 decode error: {0}")]
    Base64Error(String),
}

impl SignError {
    /// Attach the failing path to an I/O error.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        SignError::IoFailure {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<openssl::error::ErrorStack> for SignError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SignError::CryptoFailure(error.to_string())
    }
}

impl From<lopdf::Error> for SignError {
    fn from(error: lopdf::Error) -> Self {
        SignError::PdfMalformed(error.to_string())
    }
}

impl From<base64::DecodeError> for SignError {
    fn from(error: base64::DecodeError) -> Self {
        SignError::Base64Error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SignError::InvalidArgument("SigningAttributes.digest".to_string());
        assert_eq!(
            error.to_string(),
            "invalid or missing 'SigningAttributes.digest' value"
        );

        let error = SignError::PlaceholderTooSmall {
            needed: 4096,
            reserved: 128,
        };
        assert!(error.to_string().contains("not enough space"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let error = SignError::io(
            "/tmp/missing.pdf",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        match error {
            SignError::IoFailure { path, .. } => assert_eq!(path, "/tmp/missing.pdf"),
            _ => panic!("wrong error type"),
        }
    }
}
