//! Error types for request signing

/// Errors raised while computing a request signature
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// The secret could not key the HMAC
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}
