// error.rs
// Error kinds shared by the state helpers and the HTTP layer.
//
// Every failure carries its kind as data; the HTTP status is looked up from the
// kind and the body is always `{ "ok": false, "msg": "..." }`.

use std::sync::OnceLock;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::state::StoreError;

static EXPOSE_INTERNAL: OnceLock<bool> = OnceLock::new();

/// Include internal error details in responses (development only).
pub fn expose_internal_errors(enabled: bool) {
    let _ = EXPOSE_INTERNAL.set(enabled);
}

fn internal_exposed() -> bool {
    EXPOSE_INTERNAL.get().copied().unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

const STATUS_BY_KIND: [(ErrorKind, StatusCode); 6] = [
    (ErrorKind::Validation, StatusCode::BAD_REQUEST),
    (ErrorKind::NotFound, StatusCode::NOT_FOUND),
    (ErrorKind::Conflict, StatusCode::CONFLICT),
    (ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED),
    (ErrorKind::Forbidden, StatusCode::FORBIDDEN),
    (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        let kind = self.kind();
        STATUS_BY_KIND
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| *status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn msg(&self) -> &str {
        match self {
            AppError::Validation(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::Internal(m) => m,
        }
    }

    pub fn no_encontrado(entidad: &str, id: u64) -> Self {
        AppError::NotFound(format!("{entidad} {id} no encontrado"))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("json error: {err}"))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Datos inválidos: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                if internal_exposed() {
                    detail.clone()
                } else {
                    "Error interno del servidor".to_string()
                }
            }
            other => other.msg().to_string(),
        };
        (status, Json(serde_json::json!({ "ok": false, "msg": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lookup_covers_every_kind() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn message_does_not_drive_status() {
        // A "not found" wording inside a validation error stays a 400.
        let err = AppError::Validation("usuario no encontrado en el formulario".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
