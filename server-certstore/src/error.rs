use std::time::Duration;
use thiserror::Error;

/// Stage of a retrieval attempt that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Connect,
    Handshake,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutStage::Connect => f.write_str("TCP connect"),
            TimeoutStage::Handshake => f.write_str("TLS handshake"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CertStoreError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No such algorithm: {0}")]
    NoSuchAlgorithm(String),

    #[error("Capturing trust context is unavailable: {0}")]
    TrustContextUnavailable(String),

    #[error("Connection to {target} failed: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {target} failed: {source}")]
    HandshakeFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: TimeoutStage, after: Duration },

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Certificate parse error: {0}")]
    CertificateParse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CertStoreError {
    /// Whether the failure happened at the connection layer, where a later
    /// attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CertStoreError::ConnectionFailed { .. }
                | CertStoreError::HandshakeFailed { .. }
                | CertStoreError::Timeout { .. }
        )
    }
}

pub type CertStoreResult<T> = Result<T, CertStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_layer_errors_are_retryable() {
        let refused = CertStoreError::ConnectionFailed {
            target: "https://127.0.0.1:1".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_retryable());

        let timeout = CertStoreError::Timeout {
            stage: TimeoutStage::Handshake,
            after: Duration::from_secs(3),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.to_string(), "TLS handshake timed out after 3s");
    }

    #[test]
    fn test_misuse_errors_are_not_retryable() {
        assert!(!CertStoreError::Unsupported("CRL retrieval").is_retryable());
        assert!(!CertStoreError::TrustContextUnavailable("boom".into()).is_retryable());
        assert!(!CertStoreError::InvalidTarget("no host".into()).is_retryable());
    }
}
