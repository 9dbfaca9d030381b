// routes/parcialidades.rs
// /api/parcialidades: installments toward the major-expenses fund.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use chrono::Datelike;
use serde::Deserialize;

use crate::{
    error::AppError,
    models::{EstadoParcialidad, Parcialidad, Permiso},
    schemas::{CrearParcialidadInput, MetaParcialidadesInput, RechazoInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, FiltroParcialidades, definir_meta, eliminar_parcialidad,
        listar_parcialidades, obtener_meta, obtener_parcialidad, progreso_parcialidades,
        rechazar_parcialidad, registrar_parcialidad, validar_parcialidad,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, hoy, ok, ok_msg};

#[derive(Deserialize)]
pub struct ProgresoQuery {
    anio: Option<i32>,
}

fn es_propia(session: &SessionUser, parcialidad: &Parcialidad) -> bool {
    session.departamento() == Some(parcialidad.departamento.as_str())
}

pub async fn parcialidades_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(mut filtro): Query<FiltroParcialidades>,
) -> ApiResult {
    if !session.es_gestor() {
        filtro.departamento = Some(session.departamento().unwrap_or_default().to_string());
    }
    ok(listar_parcialidades(&state, &filtro))
}

pub async fn parcialidades_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    let parcialidad = obtener_parcialidad(&state, id)?;
    if !session.es_gestor() && !es_propia(&session, &parcialidad) {
        return Err(AppError::Forbidden(
            "La parcialidad no pertenece a tu departamento".to_string(),
        ));
    }
    ok(parcialidad)
}

pub async fn parcialidades_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearParcialidadInput>,
) -> ApiResult {
    if session.es_gestor() {
        session.requerir_permiso(Permiso::Parcialidades)?;
    }
    let usuario = session.usuario().clone();
    let auditoria = evento(&session, AccionAuditoria::Create, "parcialidades");
    let parcialidad = en_disco(&state, move |state| {
        let parcialidad = registrar_parcialidad(state, &body, &usuario)?;
        state.auditoria.registrar(auditoria.id(parcialidad.id).despues(&parcialidad));
        Ok(parcialidad)
    })
    .await?;
    ok_msg("Pago registrado, pendiente de validación", parcialidad)
}

pub async fn parcialidades_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    if !session.puede(Permiso::Parcialidades) {
        let parcialidad = obtener_parcialidad(&state, id)?;
        if !es_propia(&session, &parcialidad) {
            return Err(AppError::Forbidden(
                "La parcialidad no pertenece a tu departamento".to_string(),
            ));
        }
        if parcialidad.estado != EstadoParcialidad::Pendiente {
            return Err(AppError::Conflict(
                "Solo se pueden eliminar parcialidades pendientes".to_string(),
            ));
        }
    }
    let auditoria = evento(&session, AccionAuditoria::Delete, "parcialidades").id(id);
    let parcialidad = en_disco(&state, move |state| {
        let parcialidad = eliminar_parcialidad(state, id)?;
        state.auditoria.registrar(auditoria.antes(&parcialidad));
        Ok(parcialidad)
    })
    .await?;
    ok_msg("Parcialidad eliminada", parcialidad)
}

pub async fn parcialidades_validar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Parcialidades)?;
    let antes = obtener_parcialidad(&state, id)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "parcialidades").id(id).antes(&antes);
    let parcialidad = en_disco(&state, move |state| {
        let parcialidad = validar_parcialidad(state, id, actor)?;
        state.auditoria.registrar(auditoria.despues(&parcialidad));
        Ok(parcialidad)
    })
    .await?;
    ok_msg("Parcialidad validada", parcialidad)
}

pub async fn parcialidades_rechazar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<RechazoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Parcialidades)?;
    let antes = obtener_parcialidad(&state, id)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "parcialidades").id(id).antes(&antes);
    let parcialidad = en_disco(&state, move |state| {
        let parcialidad = rechazar_parcialidad(state, id, body.observaciones, actor)?;
        state.auditoria.registrar(auditoria.despues(&parcialidad));
        Ok(parcialidad)
    })
    .await?;
    ok_msg("Parcialidad rechazada", parcialidad)
}

pub async fn parcialidades_progreso(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProgresoQuery>,
) -> ApiResult {
    let anio = query.anio.unwrap_or_else(|| hoy().year());
    ok(progreso_parcialidades(&state, anio))
}

pub async fn parcialidades_meta(State(state): State<Arc<AppState>>) -> ApiResult {
    ok(obtener_meta(&state))
}

pub async fn parcialidades_meta_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<MetaParcialidadesInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Parcialidades)?;
    let antes = obtener_meta(&state);
    let auditoria = evento(&session, AccionAuditoria::Update, "meta_parcialidades").antes(&antes);
    let meta = en_disco(&state, move |state| {
        let meta = definir_meta(state, &body)?;
        state.auditoria.registrar(auditoria.despues(&meta));
        Ok(meta)
    })
    .await?;
    ok_msg("Meta actualizada", meta)
}
