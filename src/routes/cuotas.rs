// routes/cuotas.rs
// /api/cuotas: listing, CRUD, bulk generation, overdue refresh and payments.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde_json::json;

use crate::{
    error::AppError,
    models::{Cuota, Permiso},
    schemas::{ActualizarCuotaInput, CrearCuotaInput, GenerarCuotasInput, PagoCuotaInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, FiltroCuotas, actualizar_cuota, actualizar_vencidas,
        crear_cuota, eliminar_cuota, generar_cuotas, listar_cuotas, obtener_cuota, pagar_cuota,
        resumen_cuotas,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, hoy, ok, ok_msg};

/// Tenants only ever see their own departamento.
fn limitar_filtro(session: &SessionUser, mut filtro: FiltroCuotas) -> FiltroCuotas {
    if !session.es_gestor() {
        filtro.departamento = Some(session.departamento().unwrap_or_default().to_string());
    }
    filtro
}

fn puede_ver(session: &SessionUser, cuota: &Cuota) -> bool {
    session.es_gestor() || session.departamento() == Some(cuota.departamento.as_str())
}

pub async fn cuotas_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filtro): Query<FiltroCuotas>,
) -> ApiResult {
    ok(listar_cuotas(&state, &limitar_filtro(&session, filtro)))
}

pub async fn cuotas_resumen(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(filtro): Query<FiltroCuotas>,
) -> ApiResult {
    ok(resumen_cuotas(&state, &limitar_filtro(&session, filtro)))
}

pub async fn cuotas_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    let cuota = obtener_cuota(&state, id)?;
    if !puede_ver(&session, &cuota) {
        return Err(AppError::Forbidden("La cuota no pertenece a tu departamento".to_string()));
    }
    ok(cuota)
}

pub async fn cuotas_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearCuotaInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let auditoria = evento(&session, AccionAuditoria::Create, "cuotas");
    let cuota = en_disco(&state, move |state| {
        let cuota = crear_cuota(state, &body)?;
        state.auditoria.registrar(auditoria.id(cuota.id).despues(&cuota));
        Ok(cuota)
    })
    .await?;
    ok_msg("Cuota creada", cuota)
}

pub async fn cuotas_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<ActualizarCuotaInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let antes = obtener_cuota(&state, id)?;
    let auditoria = evento(&session, AccionAuditoria::Update, "cuotas").id(id).antes(&antes);
    let cuota = en_disco(&state, move |state| {
        let cuota = actualizar_cuota(state, id, &body, hoy())?;
        state.auditoria.registrar(auditoria.despues(&cuota));
        Ok(cuota)
    })
    .await?;
    ok_msg("Cuota actualizada", cuota)
}

pub async fn cuotas_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let auditoria = evento(&session, AccionAuditoria::Delete, "cuotas").id(id);
    let cuota = en_disco(&state, move |state| {
        let cuota = eliminar_cuota(state, id)?;
        state.auditoria.registrar(auditoria.antes(&cuota));
        Ok(cuota)
    })
    .await?;
    ok_msg("Cuota eliminada", cuota)
}

pub async fn cuotas_generar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<GenerarCuotasInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let auditoria = evento(&session, AccionAuditoria::Create, "cuotas");
    let creadas = en_disco(&state, move |state| {
        let creadas = generar_cuotas(state, &body)?;
        let ids: Vec<u64> = creadas.iter().map(|c| c.id).collect();
        state.auditoria.registrar(auditoria.despues(&json!({ "generadas": ids })));
        Ok(creadas)
    })
    .await?;
    ok_msg(&format!("{} cuotas generadas", creadas.len()), creadas)
}

pub async fn cuotas_actualizar_vencidas(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let actualizadas = en_disco(&state, |state| actualizar_vencidas(state, hoy())).await?;
    ok(json!({ "actualizadas": actualizadas }))
}

pub async fn cuotas_pagar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<PagoCuotaInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cuotas)?;
    let antes = obtener_cuota(&state, id)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "cuotas").id(id).antes(&antes);
    let (cuota, fondos) = en_disco(&state, move |state| {
        let (cuota, fondos) = pagar_cuota(state, id, &body, Some(actor))?;
        state.auditoria.registrar(auditoria.despues(&cuota));
        Ok((cuota, fondos))
    })
    .await?;
    ok_msg("Pago registrado", json!({ "cuota": cuota, "fondos": fondos }))
}
