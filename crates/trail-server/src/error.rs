use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use trail_chain::{ChainError, StoreError};
use trail_export::ExportError;
use trail_gate::GateError;
use trail_objects::ObjectError;
use trail_types::TypeError;

/// Errors surfaced by the HTTP layer.
///
/// Identity-based denials collapse into [`ServerError::NotFound`] so that
/// responses never reveal whether the resource exists; `Forbidden` is
/// reserved for callers that may read the resource but not perform the
/// operation.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("operation not allowed")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("chain broken: predecessor of rev {rev} is missing")]
    ChainBroken { rev: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ChainBroken { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuotaExceeded(_) => StatusCode::PRECONDITION_FAILED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "ACCESS_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::ChainBroken { .. } => "CHAIN_BROKEN",
            Self::Conflict(_) => "CONFLICT",
            Self::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Config(_) | Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChainError> for ServerError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::TrailNotFound(_) | ChainError::StepNotFound(_) => Self::NotFound,
            ChainError::ChainBroken { rev, .. } => Self::ChainBroken { rev },
            ChainError::RevConflict { trail, rev } => {
                Self::Conflict(format!("step {trail}-{rev} already exists"))
            }
            ChainError::TrailExists(id) => Self::Conflict(format!("trail {id} already exists")),
            ChainError::Codec(e) => Self::BadRequest(e.to_string()),
            ChainError::Object(e) => e.into(),
            ChainError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(msg) => Self::Unavailable(msg),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<ObjectError> for ServerError {
    fn from(err: ObjectError) -> Self {
        match err {
            ObjectError::QuotaExceeded { .. } => Self::QuotaExceeded(err.to_string()),
            ObjectError::NotAvailable { .. } => Self::NotFound,
            ObjectError::Timeout(msg) => Self::Unavailable(msg),
            ObjectError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<GateError> for ServerError {
    fn from(err: GateError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ExportError> for ServerError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Chain(e) => e.into(),
            ExportError::Object(e) => e.into(),
            ExportError::MissingObject { .. } => Self::NotFound,
            ExportError::Codec(e) => Self::Internal(e.to_string()),
            ExportError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<TypeError> for ServerError {
    fn from(err: TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
