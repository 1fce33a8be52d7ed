use thiserror::Error;

use trail_codec::CodecError;
use trail_objects::ObjectError;
use trail_types::{Rev, StepId, TrailId};

/// Errors from the trail/step storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from step chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("trail not found: {0}")]
    TrailNotFound(TrailId),

    #[error("trail already exists: {0}")]
    TrailExists(TrailId),

    #[error("step not found: {0}")]
    StepNotFound(StepId),

    #[error("chain broken: predecessor of {trail}-{rev} is missing")]
    ChainBroken { trail: TrailId, rev: Rev },

    #[error("revision conflict: step {trail}-{rev} already exists")]
    RevConflict { trail: TrailId, rev: Rev },

    #[error("state codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("object store error: {0}")]
    Object(#[from] ObjectError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type ChainResult<T> = Result<T, ChainError>;
