// routes/sistema.rs
// Dashboard, health, integrity validation, backups and the audit trail.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, crear_respaldo, dashboard, listar_respaldos,
        restaurar_respaldo, salud,
    },
};

use super::helpers::{ApiResult, en_disco, evento, hoy, ok, ok_msg};

#[derive(Deserialize)]
pub struct AuditoriaQuery {
    fecha: Option<NaiveDate>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult {
    let usuarios = state.store.read(|doc| doc.usuarios.len());
    ok(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "usuarios": usuarios,
    }))
}

pub async fn dashboard_show(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    ok(dashboard(&state, session.usuario(), hoy()))
}

pub async fn validacion_show(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    session.requerir_admin()?;
    ok(state.store.read(salud::revisar))
}

pub async fn validacion_reparar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    session.requerir_admin()?;
    let auditoria = evento(&session, AccionAuditoria::Update, "sistema");
    let acciones = en_disco(&state, move |state| {
        let acciones = state.store.update(|doc| Ok(salud::reparar(doc)))?;
        if !acciones.is_empty() {
            tracing::info!(acciones = acciones.len(), "document repaired");
            state
                .auditoria
                .registrar(auditoria.despues(&json!({ "reparaciones": acciones })));
        }
        Ok(acciones)
    })
    .await?;
    let informe = state.store.read(salud::revisar);
    ok(json!({ "acciones": acciones, "informe": informe }))
}

pub async fn respaldos_index(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    session.requerir_admin()?;
    ok(listar_respaldos(&state)?)
}

pub async fn respaldos_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    session.requerir_admin()?;
    let respaldo = en_disco(&state, crear_respaldo).await?;
    ok_msg("Respaldo creado", respaldo)
}

pub async fn respaldos_restaurar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(nombre): Path<String>,
) -> ApiResult {
    session.requerir_admin()?;
    let auditoria = evento(&session, AccionAuditoria::Restore, "sistema");
    let respaldo = en_disco(&state, move |state| {
        let respaldo = restaurar_respaldo(state, &nombre)?;
        state.auditoria.registrar(auditoria.despues(&respaldo));
        Ok(respaldo)
    })
    .await?;
    ok_msg("Respaldo restaurado", respaldo)
}

pub async fn auditoria_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditoriaQuery>,
) -> ApiResult {
    session.requerir_admin()?;
    let fecha = query.fecha.unwrap_or_else(hoy);
    ok(state.auditoria.leer(fecha)?)
}
