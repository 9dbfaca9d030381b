// routes/fondos.rs
// /api/fondos: balances, transfers, manual adjustments and the movement log.

use std::sync::Arc;

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::{
    models::Permiso,
    schemas::{AjusteFondoInput, TransferenciaInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, ajustar_fondo, listar_movimientos, obtener_fondos, parse_fondo,
        transferir_entre_fondos,
    },
};

use super::helpers::{ApiResult, Validated, en_disco, evento, ok, ok_msg};

#[derive(Deserialize)]
pub struct MovimientosQuery {
    fondo: Option<String>,
}

pub async fn fondos_index(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    session.requerir_gestor()?;
    ok(obtener_fondos(&state))
}

pub async fn fondos_movimientos(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovimientosQuery>,
) -> ApiResult {
    session.requerir_gestor()?;
    let fondo = match query.fondo.as_deref().filter(|f| !f.is_empty()) {
        Some(f) => Some(parse_fondo(f)?),
        None => None,
    };
    ok(listar_movimientos(&state, fondo))
}

pub async fn fondos_transferir(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<TransferenciaInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Fondos)?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "fondos");
    let (fondos, movimiento) = en_disco(&state, move |state| {
        let antes = obtener_fondos(state);
        let (fondos, movimiento) = transferir_entre_fondos(
            state,
            &body.origen,
            &body.destino,
            body.monto,
            body.concepto,
            Some(actor),
        )?;
        state
            .auditoria
            .registrar(auditoria.id(movimiento.id).antes(&antes).despues(&fondos));
        Ok((fondos, movimiento))
    })
    .await?;
    ok_msg("Transferencia realizada", json!({ "fondos": fondos, "movimiento": movimiento }))
}

pub async fn fondos_ajustar(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<AjusteFondoInput>,
) -> ApiResult {
    session.requerir_admin()?;
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Update, "fondos");
    let (fondos, movimiento) = en_disco(&state, move |state| {
        let antes = obtener_fondos(state);
        let (fondos, movimiento) =
            ajustar_fondo(state, &body.fondo, body.saldo, &body.motivo, Some(actor))?;
        state
            .auditoria
            .registrar(auditoria.id(movimiento.id).antes(&antes).despues(&fondos));
        Ok((fondos, movimiento))
    })
    .await?;
    ok_msg("Fondo ajustado", json!({ "fondos": fondos, "movimiento": movimiento }))
}
