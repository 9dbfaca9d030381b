// routes/presupuestos.rs
// /api/presupuestos: CRUD, approval, execution, alerts and yearly summary.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::{
    error::AppResult,
    models::Permiso,
    schemas::{
        ActualizarPresupuestoInput, CrearPresupuestoInput, EjecucionInput, EstadoPresupuestoInput,
    },
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, FiltroPresupuestos, PresupuestoVista, actualizar_presupuesto,
        alertas_presupuestos, cambiar_estado_presupuesto, crear_presupuesto,
        eliminar_presupuesto, listar_presupuestos, obtener_presupuesto, registrar_ejecucion,
        resumen_presupuestos,
    },
};

use super::helpers::{ApiResult, JsonInput, Validated, en_disco, evento, ok, ok_msg};

#[derive(Deserialize)]
pub struct AnioQuery {
    anio: Option<i32>,
}

pub async fn presupuestos_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filtro): Query<FiltroPresupuestos>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(listar_presupuestos(&state, &filtro))
}

pub async fn presupuestos_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(obtener_presupuesto(&state, id)?)
}

pub async fn presupuestos_alertas(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnioQuery>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(alertas_presupuestos(&state, query.anio))
}

pub async fn presupuestos_resumen(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnioQuery>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(resumen_presupuestos(&state, query.anio))
}

pub async fn presupuestos_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearPresupuestoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Presupuestos)?;
    let auditoria = evento(&session, AccionAuditoria::Create, "presupuestos");
    let vista = en_disco(&state, move |state| {
        let vista = crear_presupuesto(state, &body)?;
        state
            .auditoria
            .registrar(auditoria.id(vista.presupuesto.id).despues(&vista.presupuesto));
        Ok(vista)
    })
    .await?;
    ok_msg("Presupuesto creado", vista)
}

/// Runs a change on an existing budget and audits before/after.
async fn modificar<F>(
    session: &SessionUser,
    state: &Arc<AppState>,
    id: u64,
    f: F,
) -> AppResult<PresupuestoVista>
where
    F: FnOnce(&AppState) -> AppResult<PresupuestoVista> + Send + 'static,
{
    let antes = obtener_presupuesto(state, id)?;
    let auditoria = evento(session, AccionAuditoria::Update, "presupuestos")
        .id(id)
        .antes(&antes.presupuesto);
    en_disco(state, move |state| {
        let vista = f(state)?;
        state.auditoria.registrar(auditoria.despues(&vista.presupuesto));
        Ok(vista)
    })
    .await
}

pub async fn presupuestos_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<ActualizarPresupuestoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Presupuestos)?;
    let vista = modificar(&session, &state, id, move |state| {
        actualizar_presupuesto(state, id, &body)
    })
    .await?;
    ok_msg("Presupuesto actualizado", vista)
}

pub async fn presupuestos_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Presupuestos)?;
    let auditoria = evento(&session, AccionAuditoria::Delete, "presupuestos").id(id);
    let presupuesto = en_disco(&state, move |state| {
        let presupuesto = eliminar_presupuesto(state, id)?;
        state.auditoria.registrar(auditoria.antes(&presupuesto));
        Ok(presupuesto)
    })
    .await?;
    ok_msg("Presupuesto eliminado", presupuesto)
}

pub async fn presupuestos_estado(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    JsonInput(body): JsonInput<EstadoPresupuestoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Presupuestos)?;
    let vista = modificar(&session, &state, id, move |state| {
        cambiar_estado_presupuesto(state, id, body.estado)
    })
    .await?;
    ok_msg("Estado actualizado", vista)
}

pub async fn presupuestos_ejecucion(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<EjecucionInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Presupuestos)?;
    let vista = modificar(&session, &state, id, move |state| {
        registrar_ejecucion(state, id, body.monto)
    })
    .await?;
    ok_msg("Ejecución registrada", vista)
}
