use thiserror::Error;

/// Failures while building or opening a payload token.
///
/// Callers of [`crate::payload::decode`] never see this type; it only surfaces
/// from encoding and in debug logs.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] bincode::Error),

    #[error("payload compression failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload exceeds the maximum envelope size")]
    TooLarge,

    #[error("payload lifetime of {0} minutes is out of range")]
    Lifetime(i64),
}

/// Why a link issuer could not produce a link.
///
/// Every variant is soft: the share service logs it and moves on to the next issuer.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("signing failed: {0}")]
    Sign(String),

    #[error("link lifetime of {0} minutes is out of range")]
    Lifetime(i64),

    #[error("payload link would be {len} characters (limit {limit})")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no link issuer succeeded: {0}")]
    Exhausted(String),
}

/// Invalid settings found at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be between {min} and {max}, got {value:?}")]
    OutOfRange {
        name: &'static str,
        value: String,
        min: i64,
        max: i64,
    },

    #[error("{name}: {message}")]
    Invalid { name: &'static str, message: String },
}
