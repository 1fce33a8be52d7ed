use thiserror::Error;

use trail_types::{Prn, Sha256Id};

/// Errors from object index, blob driver, and store operations.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("object backend operation timed out: {0}")]
    Timeout(String),

    #[error("object backend error: {0}")]
    Backend(String),

    #[error("quota exceeded for {owner}: {used} used + {candidate} candidate > {quota}")]
    QuotaExceeded {
        owner: Prn,
        used: u64,
        quota: u64,
        candidate: u64,
    },

    #[error("no public source available for object {sha}")]
    NotAvailable { sha: Sha256Id },
}

impl ObjectError {
    /// Transient backend failures are safe for the caller to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type ObjectResult<T> = Result<T, ObjectError>;
