// routes/helpers.rs
// Shared pieces for the API handlers: JSON envelope, body extractor, audit shortcut.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use chrono::{NaiveDate, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    schemas::validate_input,
    session::SessionUser,
    state::{AccionAuditoria, AppState, EventoAuditoria},
};

pub(crate) type ApiResult = AppResult<Json<Value>>;

/// `{ "ok": true, "data": ... }`
pub(crate) fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({ "ok": true, "data": serde_json::to_value(data)? })))
}

pub(crate) fn ok_msg<T: Serialize>(msg: &str, data: T) -> ApiResult {
    Ok(Json(json!({ "ok": true, "msg": msg, "data": serde_json::to_value(data)? })))
}

pub(crate) fn hoy() -> NaiveDate {
    Utc::now().date_naive()
}

/// JSON body whose rejections use the API error envelope.
pub(crate) struct JsonInput<T>(pub T);

impl<S, T> FromRequest<S> for JsonInput<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonInput(value))
            .map_err(|rejection: JsonRejection| {
                AppError::Validation(format!("Cuerpo inválido: {}", rejection.body_text()))
            })
    }
}

/// Deserializes and runs `validator` rules in one step.
pub(crate) struct Validated<T>(pub T);

impl<S, T> FromRequest<S> for Validated<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonInput(value) = JsonInput::<T>::from_request(req, state).await?;
        validate_input(&value)?;
        Ok(Validated(value))
    }
}

/// Audit event pre-filled with the acting user.
pub(crate) fn evento(session: &SessionUser, accion: AccionAuditoria, entidad: &str) -> EventoAuditoria {
    EventoAuditoria::new(accion, entidad).actor(session.usuario())
}

/// Runs a store write (and the audit append that goes with it) on the blocking
/// pool. Both fsync the disk while holding a std lock.
pub(crate) async fn en_disco<T, F>(state: &Arc<AppState>, f: F) -> AppResult<T>
where
    F: FnOnce(&AppState) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|err| AppError::Internal(format!("Escritura interrumpida: {err}")))?
}
