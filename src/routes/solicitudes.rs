// routes/solicitudes.rs
// /api/solicitudes: tenant requests and their answers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};

use crate::{
    error::AppError,
    models::Permiso,
    schemas::{CrearSolicitudInput, ResponderSolicitudInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, FiltroSolicitudes, crear_solicitud, eliminar_solicitud,
        listar_solicitudes, obtener_solicitud, responder_solicitud,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, ok, ok_msg};

pub async fn solicitudes_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(mut filtro): Query<FiltroSolicitudes>,
) -> ApiResult {
    if !session.es_gestor() {
        filtro.usuario_id = Some(session.id());
        filtro.departamento = None;
    }
    ok(listar_solicitudes(&state, &filtro))
}

pub async fn solicitudes_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    let solicitud = obtener_solicitud(&state, id)?;
    if !session.es_gestor() && solicitud.usuario_id != session.id() {
        return Err(AppError::Forbidden(
            "La solicitud no te pertenece".to_string(),
        ));
    }
    ok(solicitud)
}

pub async fn solicitudes_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearSolicitudInput>,
) -> ApiResult {
    let usuario = session.usuario().clone();
    let auditoria = evento(&session, AccionAuditoria::Create, "solicitudes");
    let solicitud = en_disco(&state, move |state| {
        let solicitud = crear_solicitud(state, &body, &usuario)?;
        state.auditoria.registrar(auditoria.id(solicitud.id).despues(&solicitud));
        Ok(solicitud)
    })
    .await?;
    ok_msg("Solicitud enviada", solicitud)
}

pub async fn solicitudes_responder(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<ResponderSolicitudInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Solicitudes)?;
    let antes = obtener_solicitud(&state, id)?;
    let auditoria = evento(&session, AccionAuditoria::Update, "solicitudes").id(id).antes(&antes);
    let solicitud = en_disco(&state, move |state| {
        let solicitud = responder_solicitud(state, id, &body)?;
        state.auditoria.registrar(auditoria.despues(&solicitud));
        Ok(solicitud)
    })
    .await?;
    ok_msg("Solicitud actualizada", solicitud)
}

pub async fn solicitudes_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    let gestiona = session.puede(Permiso::Solicitudes);
    let usuario = session.usuario().clone();
    let auditoria = evento(&session, AccionAuditoria::Delete, "solicitudes").id(id);
    let solicitud = en_disco(&state, move |state| {
        let solicitud = eliminar_solicitud(state, id, &usuario, gestiona)?;
        state.auditoria.registrar(auditoria.antes(&solicitud));
        Ok(solicitud)
    })
    .await?;
    ok_msg("Solicitud eliminada", solicitud)
}
