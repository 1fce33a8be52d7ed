use thiserror::Error;

/// Errors from access resolution.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("device directory error: {0}")]
    Directory(String),
}

pub type GateResult<T> = Result<T, GateError>;
