use thiserror::Error;

/// Errors from parsing or validating foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid resource name: {0}")]
    InvalidPrn(String),

    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("invalid step id: {0}")]
    InvalidStepId(String),

    #[error("invalid revision selector: {0}")]
    InvalidRevSelector(String),
}
