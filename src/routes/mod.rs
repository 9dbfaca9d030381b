// routes/mod.rs
// Route handlers and the router that wires them under /api.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};

use crate::{
    config::{MAX_ARCHIVOS_POR_ANUNCIO, MAX_BYTES_POR_ARCHIVO},
    session,
    state::AppState,
};

mod helpers;

pub mod anuncios;
pub mod auth;
pub mod cierres;
pub mod cuotas;
pub mod fondos;
pub mod gastos;
pub mod home;
pub mod parcialidades;
pub mod presupuestos;
pub mod sistema;
pub mod solicitudes;
pub mod usuarios;

pub use anuncios::*;
pub use auth::*;
pub use cierres::*;
pub use cuotas::*;
pub use fondos::*;
pub use gastos::*;
pub use home::home;
pub use parcialidades::*;
pub use presupuestos::*;
pub use sistema::*;
pub use solicitudes::*;
pub use usuarios::*;

/// Room for a full announcement form: five maximum-size files plus the text fields.
const BODY_LIMIT: usize = MAX_ARCHIVOS_POR_ANUNCIO * MAX_BYTES_POR_ARCHIVO + 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/password", put(change_password))
        .route("/api/dashboard", get(dashboard_show))
        .route("/api/usuarios", get(usuarios_index).post(usuarios_create))
        .route(
            "/api/usuarios/{id}",
            get(usuarios_show).put(usuarios_update).delete(usuarios_delete),
        )
        .route("/api/permisos", get(permisos_index))
        .route("/api/permisos/{id}", put(permisos_update))
        .route("/api/cuotas", get(cuotas_index).post(cuotas_create))
        .route("/api/cuotas/resumen", get(cuotas_resumen))
        .route("/api/cuotas/generar", post(cuotas_generar))
        .route("/api/cuotas/actualizar-vencidas", post(cuotas_actualizar_vencidas))
        .route(
            "/api/cuotas/{id}",
            get(cuotas_show).put(cuotas_update).delete(cuotas_delete),
        )
        .route("/api/cuotas/{id}/pagar", post(cuotas_pagar))
        .route("/api/gastos", get(gastos_index).post(gastos_create))
        .route(
            "/api/gastos/{id}",
            get(gastos_show).put(gastos_update).delete(gastos_delete),
        )
        .route(
            "/api/presupuestos",
            get(presupuestos_index).post(presupuestos_create),
        )
        .route("/api/presupuestos/alertas", get(presupuestos_alertas))
        .route("/api/presupuestos/resumen", get(presupuestos_resumen))
        .route(
            "/api/presupuestos/{id}",
            get(presupuestos_show)
                .put(presupuestos_update)
                .delete(presupuestos_delete),
        )
        .route("/api/presupuestos/{id}/estado", put(presupuestos_estado))
        .route("/api/presupuestos/{id}/ejecucion", post(presupuestos_ejecucion))
        .route("/api/anuncios", get(anuncios_index).post(anuncios_create))
        .route(
            "/api/anuncios/{id}",
            get(anuncios_show).put(anuncios_update).delete(anuncios_delete),
        )
        .route("/api/anuncios/{id}/archivos/{nombre}", get(anuncios_archivo))
        .route(
            "/api/solicitudes",
            get(solicitudes_index).post(solicitudes_create),
        )
        .route(
            "/api/solicitudes/{id}",
            get(solicitudes_show).delete(solicitudes_delete),
        )
        .route("/api/solicitudes/{id}/responder", put(solicitudes_responder))
        .route("/api/cierres", get(cierres_index).post(cierres_create))
        .route("/api/cierres/balance", get(cierres_balance))
        .route("/api/cierres/{id}", get(cierres_show))
        .route("/api/fondos", get(fondos_index))
        .route("/api/fondos/movimientos", get(fondos_movimientos))
        .route("/api/fondos/transferir", post(fondos_transferir))
        .route("/api/fondos/ajustar", post(fondos_ajustar))
        .route(
            "/api/parcialidades",
            get(parcialidades_index).post(parcialidades_create),
        )
        .route("/api/parcialidades/progreso", get(parcialidades_progreso))
        .route(
            "/api/parcialidades/meta",
            get(parcialidades_meta).put(parcialidades_meta_update),
        )
        .route(
            "/api/parcialidades/{id}",
            get(parcialidades_show).delete(parcialidades_delete),
        )
        .route("/api/parcialidades/{id}/validar", post(parcialidades_validar))
        .route("/api/parcialidades/{id}/rechazar", post(parcialidades_rechazar))
        .route("/api/validacion", get(validacion_show))
        .route("/api/validacion/reparar", post(validacion_reparar))
        .route("/api/respaldos", get(respaldos_index).post(respaldos_create))
        .route("/api/respaldos/{nombre}/restaurar", post(respaldos_restaurar))
        .route("/api/auditoria", get(auditoria_index))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/", get(home))
        .route("/api/auth/login", post(login))
        .route("/api/health", get(health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
