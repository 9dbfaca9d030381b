// routes/auth.rs
// POST /api/auth/login, POST /api/auth/logout, GET /api/auth/me, PUT /api/auth/password

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    error::AppResult,
    schemas::{CambiarPasswordInput, LoginInput},
    session::{SESSION_COOKIE_NAME, SessionUser},
    state::{AccionAuditoria, AppState, EventoAuditoria, autenticar, cambiar_password},
};

use super::helpers::{ApiResult, Validated, en_disco, ok, ok_msg};

fn session_cookie(token: &str, max_age: u64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}"
    ))
    .ok()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<LoginInput>,
) -> AppResult<Response> {
    let email = body.email.trim().to_string();
    let resultado = en_disco(&state, move |state| {
        let usuario = autenticar(state, &body.email, &body.password)?;
        state.auditoria.registrar(
            EventoAuditoria::new(AccionAuditoria::Login, "usuarios")
                .id(usuario.id)
                .actor(&usuario),
        );
        Ok(usuario)
    })
    .await;
    let usuario = match resultado {
        Ok(u) => u,
        Err(err) => {
            tracing::warn!(email = %email, "login rejected");
            return Err(err);
        }
    };
    let sesion = state.sesiones.crear(usuario.id);
    tracing::info!(usuario_id = usuario.id, rol = usuario.rol.as_str(), "login ok");

    let mut response = Json(json!({
        "ok": true,
        "data": {
            "token": sesion.token,
            "expira": sesion.expira,
            "usuario": usuario.publico(),
        }
    }))
    .into_response();
    if let Some(cookie) = session_cookie(&sesion.token, state.config.session_ttl_seconds) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn logout(session: SessionUser, State(state): State<Arc<AppState>>) -> Response {
    state.sesiones.eliminar(session.token());
    let mut response = Json(json!({ "ok": true, "msg": "Sesión cerrada" })).into_response();
    if let Some(cookie) = session_cookie("", 0) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

pub async fn me(session: SessionUser) -> ApiResult {
    ok(session.usuario().publico())
}

pub async fn change_password(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CambiarPasswordInput>,
) -> ApiResult {
    let id = session.id();
    en_disco(&state, move |state| {
        cambiar_password(state, id, &body.actual, &body.nueva)
    })
    .await?;
    ok_msg("Contraseña actualizada", ())
}
