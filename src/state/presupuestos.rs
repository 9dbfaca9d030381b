use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{EstadoPresupuesto, Presupuesto, redondear},
    schemas::{ActualizarPresupuestoInput, CrearPresupuestoInput, to_patch},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove, update},
    fondos::validar_monto,
};

pub const UMBRAL_ADVERTENCIA: f64 = 0.8;
pub const UMBRAL_CRITICO: f64 = 1.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NivelAlerta {
    Advertencia,
    Critico,
}

/// Classifies an execution ratio: at least 1.0 is critical, at least 0.8 a warning.
pub fn clasificar(ratio: f64) -> Option<NivelAlerta> {
    if ratio >= UMBRAL_CRITICO {
        Some(NivelAlerta::Critico)
    } else if ratio >= UMBRAL_ADVERTENCIA {
        Some(NivelAlerta::Advertencia)
    } else {
        None
    }
}

/// A presupuesto with its derived execution figures.
#[derive(Debug, Clone, Serialize)]
pub struct PresupuestoVista {
    #[serde(flatten)]
    pub presupuesto: Presupuesto,
    pub porcentaje_ejecucion: f64,
    pub monto_disponible: f64,
}

impl From<Presupuesto> for PresupuestoVista {
    fn from(presupuesto: Presupuesto) -> Self {
        let porcentaje_ejecucion = if presupuesto.monto > 0.0 {
            redondear(presupuesto.monto_ejecutado / presupuesto.monto * 100.0)
        } else {
            0.0
        };
        PresupuestoVista {
            monto_disponible: redondear(presupuesto.monto - presupuesto.monto_ejecutado),
            porcentaje_ejecucion,
            presupuesto,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertaPresupuesto {
    pub presupuesto_id: u64,
    pub titulo: String,
    pub categoria: String,
    pub nivel: NivelAlerta,
    pub porcentaje_ejecucion: f64,
    pub monto: f64,
    pub monto_ejecutado: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumenPresupuestos {
    pub anio: Option<i32>,
    pub cantidad: usize,
    pub total_asignado: f64,
    pub total_ejecutado: f64,
    pub total_disponible: f64,
    pub porcentaje_ejecucion: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroPresupuestos {
    pub anio: Option<i32>,
    pub estado: Option<EstadoPresupuesto>,
    pub categoria: Option<String>,
}

pub fn listar_presupuestos(state: &AppState, filtro: &FiltroPresupuestos) -> Vec<PresupuestoVista> {
    state.store.read(|doc| {
        doc.presupuestos
            .iter()
            .filter(|p| {
                filtro.anio.is_none_or(|a| p.anio == a)
                    && filtro.estado.is_none_or(|e| p.estado == e)
                    && filtro
                        .categoria
                        .as_deref()
                        .is_none_or(|c| p.categoria.eq_ignore_ascii_case(c))
            })
            .cloned()
            .map(PresupuestoVista::from)
            .collect()
    })
}

pub fn obtener_presupuesto(state: &AppState, id: u64) -> AppResult<PresupuestoVista> {
    state
        .store
        .read(|doc| buscar::<Presupuesto>(doc, id).cloned())
        .map(PresupuestoVista::from)
}

pub fn crear_presupuesto(state: &AppState, input: &CrearPresupuestoInput) -> AppResult<PresupuestoVista> {
    if !input.monto.is_finite() || input.monto < 0.0 {
        return Err(AppError::Validation("El monto no puede ser negativo".to_string()));
    }
    let titulo = input.titulo.trim().to_string();
    if titulo.is_empty() {
        return Err(AppError::Validation("El título es obligatorio".to_string()));
    }
    state
        .store
        .update(|doc| {
            Ok(create(
                doc,
                Presupuesto {
                    id: 0,
                    titulo: titulo.clone(),
                    descripcion: input.descripcion.clone(),
                    monto: redondear(input.monto),
                    monto_ejecutado: 0.0,
                    categoria: input.categoria.trim().to_lowercase(),
                    anio: input.anio,
                    estado: EstadoPresupuesto::Borrador,
                    created_at: Utc::now(),
                    updated_at: None,
                },
            ))
        })
        .map(PresupuestoVista::from)
}

pub fn actualizar_presupuesto(
    state: &AppState,
    id: u64,
    input: &ActualizarPresupuestoInput,
) -> AppResult<PresupuestoVista> {
    let mut patch = to_patch(input)?;
    patch.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);
    state
        .store
        .update(|doc| update::<Presupuesto>(doc, id, &patch))
        .map(PresupuestoVista::from)
}

/// Budgets with executed spending keep their history and cannot be deleted.
pub fn eliminar_presupuesto(state: &AppState, id: u64) -> AppResult<Presupuesto> {
    state.store.update(|doc| {
        if doc.gastos.iter().any(|g| g.presupuesto_id == Some(id)) {
            return Err(AppError::Conflict(
                "El presupuesto tiene gastos asociados".to_string(),
            ));
        }
        remove::<Presupuesto>(doc, id)
    })
}

/// Approves or rejects a draft budget.
pub fn cambiar_estado_presupuesto(
    state: &AppState,
    id: u64,
    estado: EstadoPresupuesto,
) -> AppResult<PresupuestoVista> {
    state
        .store
        .update(|doc| {
            let presupuesto = buscar_mut::<Presupuesto>(doc, id)?;
            if presupuesto.estado == estado {
                return Ok(presupuesto.clone());
            }
            if presupuesto.estado != EstadoPresupuesto::Borrador {
                return Err(AppError::Conflict(format!(
                    "Solo los presupuestos en borrador pueden cambiar de estado (presupuesto {id})"
                )));
            }
            presupuesto.estado = estado;
            presupuesto.updated_at = Some(Utc::now());
            Ok(presupuesto.clone())
        })
        .map(PresupuestoVista::from)
}

/// Adds spending to a budget outside of a recorded gasto.
pub fn registrar_ejecucion(state: &AppState, id: u64, monto: f64) -> AppResult<PresupuestoVista> {
    let monto = validar_monto(monto, "El monto")?;
    state
        .store
        .update(|doc| {
            let presupuesto = buscar_mut::<Presupuesto>(doc, id)?;
            if presupuesto.estado == EstadoPresupuesto::Rechazado {
                return Err(AppError::Conflict(
                    "No se puede ejecutar un presupuesto rechazado".to_string(),
                ));
            }
            presupuesto.monto_ejecutado = redondear(presupuesto.monto_ejecutado + monto);
            presupuesto.updated_at = Some(Utc::now());
            Ok(presupuesto.clone())
        })
        .map(PresupuestoVista::from)
}

/// Spending against a zero allocation counts as fully over budget.
fn ratio_ejecucion(p: &Presupuesto) -> Option<f64> {
    if p.monto > 0.0 {
        Some(p.monto_ejecutado / p.monto)
    } else if p.monto_ejecutado > 0.0 {
        Some(1.0)
    } else {
        None
    }
}

pub fn alertas_presupuestos(state: &AppState, anio: Option<i32>) -> Vec<AlertaPresupuesto> {
    state.store.read(|doc| {
        doc.presupuestos
            .iter()
            .filter(|p| anio.is_none_or(|a| p.anio == a))
            .filter_map(|p| {
                let ratio = ratio_ejecucion(p)?;
                clasificar(ratio).map(|nivel| AlertaPresupuesto {
                    presupuesto_id: p.id,
                    titulo: p.titulo.clone(),
                    categoria: p.categoria.clone(),
                    nivel,
                    porcentaje_ejecucion: redondear(ratio * 100.0),
                    monto: p.monto,
                    monto_ejecutado: p.monto_ejecutado,
                })
            })
            .collect()
    })
}

pub fn resumen_presupuestos(state: &AppState, anio: Option<i32>) -> ResumenPresupuestos {
    state.store.read(|doc| {
        let mut resumen = ResumenPresupuestos {
            anio,
            ..Default::default()
        };
        for p in doc.presupuestos.iter().filter(|p| anio.is_none_or(|a| p.anio == a)) {
            resumen.cantidad += 1;
            resumen.total_asignado += p.monto;
            resumen.total_ejecutado += p.monto_ejecutado;
        }
        resumen.total_asignado = redondear(resumen.total_asignado);
        resumen.total_ejecutado = redondear(resumen.total_ejecutado);
        resumen.total_disponible = redondear(resumen.total_asignado - resumen.total_ejecutado);
        if resumen.total_asignado > 0.0 {
            resumen.porcentaje_ejecucion =
                redondear(resumen.total_ejecutado / resumen.total_asignado * 100.0);
        }
        resumen
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_thresholds() {
        assert_eq!(clasificar(0.79), None);
        assert_eq!(clasificar(0.8), Some(NivelAlerta::Advertencia));
        assert_eq!(clasificar(0.99), Some(NivelAlerta::Advertencia));
        assert_eq!(clasificar(1.0), Some(NivelAlerta::Critico));
        assert_eq!(clasificar(1.7), Some(NivelAlerta::Critico));
    }

    fn presupuesto(monto: f64, monto_ejecutado: f64) -> Presupuesto {
        Presupuesto {
            id: 1,
            titulo: "Vacío".into(),
            descripcion: None,
            monto,
            monto_ejecutado,
            categoria: "otros".into(),
            anio: 2026,
            estado: EstadoPresupuesto::Borrador,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn zero_allocation_with_spending_is_critical() {
        assert_eq!(ratio_ejecucion(&presupuesto(0.0, 0.0)), None);
        let ratio = ratio_ejecucion(&presupuesto(0.0, 100.0));
        assert_eq!(ratio.and_then(clasificar), Some(NivelAlerta::Critico));
        assert_eq!(ratio_ejecucion(&presupuesto(200.0, 100.0)), Some(0.5));
    }

    #[test]
    fn view_of_zero_budget_has_zero_percentage() {
        let vista = PresupuestoVista::from(Presupuesto {
            id: 1,
            titulo: "Vacío".into(),
            descripcion: None,
            monto: 0.0,
            monto_ejecutado: 0.0,
            categoria: "otros".into(),
            anio: 2026,
            estado: EstadoPresupuesto::Borrador,
            created_at: Utc::now(),
            updated_at: None,
        });
        assert_eq!(vista.porcentaje_ejecucion, 0.0);
        assert_eq!(vista.monto_disponible, 0.0);
    }
}
