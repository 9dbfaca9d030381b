// routes/gastos.rs
// /api/gastos CRUD. Every write moves money in the source fund.

use std::sync::Arc;

use axum::extract::{Path, Query, State};

use crate::{
    models::Permiso,
    schemas::{ActualizarGastoInput, CrearGastoInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, FiltroGastos, actualizar_gasto, crear_gasto, eliminar_gasto,
        listar_gastos, obtener_gasto,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, ok, ok_msg};

pub async fn gastos_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filtro): Query<FiltroGastos>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(listar_gastos(&state, &filtro))
}

pub async fn gastos_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(obtener_gasto(&state, id)?)
}

pub async fn gastos_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearGastoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Gastos)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Create, "gastos");
    let gasto = en_disco(&state, move |state| {
        let gasto = crear_gasto(state, &body, Some(actor))?;
        state.auditoria.registrar(auditoria.id(gasto.id).despues(&gasto));
        Ok(gasto)
    })
    .await?;
    ok_msg("Gasto registrado", gasto)
}

pub async fn gastos_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<ActualizarGastoInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Gastos)?;
    let antes = obtener_gasto(&state, id)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "gastos").id(id).antes(&antes);
    let gasto = en_disco(&state, move |state| {
        let gasto = actualizar_gasto(state, id, &body, Some(actor))?;
        state.auditoria.registrar(auditoria.despues(&gasto));
        Ok(gasto)
    })
    .await?;
    ok_msg("Gasto actualizado", gasto)
}

pub async fn gastos_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Gastos)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Delete, "gastos").id(id);
    let gasto = en_disco(&state, move |state| {
        let gasto = eliminar_gasto(state, id, Some(actor))?;
        state.auditoria.registrar(auditoria.antes(&gasto));
        Ok(gasto)
    })
    .await?;
    ok_msg("Gasto eliminado", gasto)
}
