use thiserror::Error;

use trail_chain::ChainError;
use trail_codec::CodecError;
use trail_objects::ObjectError;
use trail_types::Sha256Id;

/// Errors from export assembly and archive composition.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("state codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("object store error: {0}")]
    Object(#[from] ObjectError),

    #[error("object {name} ({sha}) is not readable")]
    MissingObject { name: String, sha: Sha256Id },

    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
