//! Error types for the static-agent-core crate.

use thiserror::Error;

/// Error type for the static agent protocol engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Message type URI could not be parsed.
    #[error("malformed message type: {0}")]
    MalformedType(String),
    /// Envelope structure is missing fields or not valid base64url/JSON.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
    /// An envelope field that should be base64url failed to decode.
    #[error("{field} is not valid base64url: {source}")]
    Base64 {
        /// The envelope field that failed to decode.
        field: &'static str,
        /// The underlying decode failure.
        #[source]
        source: base64::DecodeError,
    },
    /// JSON serialization error.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// The envelope is not addressed to any of our keys.
    #[error("message is not addressed to this key")]
    Undeliverable,
    /// AEAD authentication or decryption failure.
    #[error("decryption failed: {0}")]
    Decryption(String),
    /// Decrypted payload is not a valid message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// Key bytes do not form a valid key.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    /// Signed field failed verification.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),
}

/// Result type for the static agent protocol engine.
pub type Result<T> = std::result::Result<T, Error>;
