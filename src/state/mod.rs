// state module: AppState, initialization, and re-exports of submodules.

use anyhow::{Context, Result};

use crate::config::AppConfig;

mod store;
mod seed;
mod sesiones;
pub mod coleccion;
pub mod salud;
mod auditoria;
mod respaldos;
mod usuarios;
mod cuotas;
mod gastos;
mod presupuestos;
mod anuncios;
mod solicitudes;
mod cierres;
mod fondos;
mod parcialidades;
mod dashboard;

pub use store::{Store, StoreError};
pub use seed::{
    SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD, SEED_CUOTA_MENSUAL, SEED_TENANT_PASSWORD,
    documento_de_ejemplo,
};
pub use sesiones::{Sesion, Sesiones};
pub use auditoria::*;
pub use respaldos::*;
pub use usuarios::*;
pub use cuotas::*;
pub use gastos::*;
pub use presupuestos::*;
pub use anuncios::*;
pub use solicitudes::*;
pub use cierres::*;
pub use fondos::*;
pub use parcialidades::*;
pub use dashboard::*;

pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub sesiones: Sesiones,
    pub auditoria: AuditLog,
}

pub fn init_state(config: AppConfig) -> Result<AppState> {
    let store = Store::load(&config.data_file)
        .with_context(|| format!("failed to load data file {}", config.data_file.display()))?;
    Ok(build_state(config, store))
}

/// Wires an already opened store (tests build isolated documents this way).
pub fn build_state(config: AppConfig, store: Store) -> AppState {
    AppState {
        sesiones: Sesiones::new(config.session_ttl_seconds),
        auditoria: AuditLog::new(config.audit_dir.clone()),
        store,
        config,
    }
}
