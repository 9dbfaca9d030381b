// routes/cierres.rs
// /api/cierres: monthly and annual closures.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::{
    models::{Permiso, TipoCierre},
    schemas::{CierreInput, validate_input},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, balance_periodo, cerrar_periodo, listar_cierres, obtener_cierre,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, ok, ok_msg};

#[derive(Deserialize)]
pub struct CierresQuery {
    tipo: Option<TipoCierre>,
}

pub async fn cierres_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CierresQuery>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(listar_cierres(&state, query.tipo))
}

pub async fn cierres_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_gestor()?;
    ok(obtener_cierre(&state, id)?)
}

/// Preview of a period's figures (`?tipo=mensual&anio=2025&mes=3`).
pub async fn cierres_balance(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(periodo): Query<CierreInput>,
) -> ApiResult {
    session.requerir_gestor()?;
    validate_input(&periodo)?;
    ok(balance_periodo(&state, &periodo)?)
}

pub async fn cierres_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CierreInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Cierres)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Create, "cierres");
    let cierre = en_disco(&state, move |state| {
        let cierre = cerrar_periodo(state, &body, Some(actor))?;
        state.auditoria.registrar(auditoria.id(cierre.id).despues(&cierre));
        Ok(cierre)
    })
    .await?;
    ok_msg(&format!("Periodo {} cerrado", cierre.periodo), cierre)
}
