use thiserror::Error;

/// Errors from state encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid escape sequence in key {key:?}")]
    BadEscape { key: String },

    #[error("state root must be a JSON object, got {0}")]
    NotAnObject(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
