use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{Documento, Fondo, Gasto, Presupuesto, redondear},
    schemas::{ActualizarGastoInput, CrearGastoInput, to_patch},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove, update},
    fondos::{acreditar, debitar, validar_monto},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroGastos {
    pub categoria: Option<String>,
    pub origen_fondo: Option<Fondo>,
    pub presupuesto_id: Option<u64>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

pub fn listar_gastos(state: &AppState, filtro: &FiltroGastos) -> Vec<Gasto> {
    state.store.read(|doc| {
        let mut items: Vec<Gasto> = doc
            .gastos
            .iter()
            .filter(|g| {
                filtro
                    .categoria
                    .as_deref()
                    .is_none_or(|c| g.categoria.eq_ignore_ascii_case(c))
                    && filtro.origen_fondo.is_none_or(|f| g.origen_fondo == f)
                    && filtro.presupuesto_id.is_none_or(|p| g.presupuesto_id == Some(p))
                    && filtro.desde.is_none_or(|d| g.fecha >= d)
                    && filtro.hasta.is_none_or(|h| g.fecha <= h)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.fecha.cmp(&a.fecha).then(b.id.cmp(&a.id)));
        items
    })
}

pub fn obtener_gasto(state: &AppState, id: u64) -> AppResult<Gasto> {
    state.store.read(|doc| buscar::<Gasto>(doc, id).cloned())
}

/// Adds `delta` (possibly negative) to a budget's executed amount.
fn ajustar_ejecucion(doc: &mut Documento, presupuesto_id: u64, delta: f64) -> AppResult<()> {
    let presupuesto = buscar_mut::<Presupuesto>(doc, presupuesto_id)?;
    presupuesto.monto_ejecutado = redondear((presupuesto.monto_ejecutado + delta).max(0.0));
    presupuesto.updated_at = Some(Utc::now());
    Ok(())
}

fn texto_opcional(valor: &Option<String>) -> Option<String> {
    valor
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Records an expense, debiting its source fund and, when linked, executing its budget.
pub fn crear_gasto(
    state: &AppState,
    input: &CrearGastoInput,
    usuario_id: Option<u64>,
) -> AppResult<Gasto> {
    let monto = validar_monto(input.monto, "El monto")?;
    let concepto = input.concepto.trim().to_string();
    if concepto.is_empty() {
        return Err(AppError::Validation("El concepto es obligatorio".to_string()));
    }

    state.store.update(|doc| {
        if let Some(pid) = input.presupuesto_id {
            buscar::<Presupuesto>(doc, pid)?;
        }
        let gasto = create(
            doc,
            Gasto {
                id: 0,
                concepto: concepto.clone(),
                descripcion: texto_opcional(&input.descripcion),
                categoria: input.categoria.trim().to_lowercase(),
                monto,
                fecha: input.fecha,
                proveedor: texto_opcional(&input.proveedor),
                origen_fondo: input.origen_fondo,
                presupuesto_id: input.presupuesto_id,
                comprobante: texto_opcional(&input.comprobante),
                created_by: usuario_id,
                created_at: Utc::now(),
            },
        );
        debitar(
            doc,
            gasto.origen_fondo,
            monto,
            &format!("Gasto {}: {}", gasto.id, gasto.concepto),
            usuario_id,
        )?;
        if let Some(pid) = gasto.presupuesto_id {
            ajustar_ejecucion(doc, pid, monto)?;
        }
        Ok(gasto)
    })
}

/// Updates an expense. A changed monto re-applies the difference to the fund and budget.
pub fn actualizar_gasto(
    state: &AppState,
    id: u64,
    input: &ActualizarGastoInput,
    usuario_id: Option<u64>,
) -> AppResult<Gasto> {
    let patch = to_patch(input)?;
    state.store.update(|doc| {
        let anterior = buscar::<Gasto>(doc, id)?.clone();
        let gasto = update::<Gasto>(doc, id, &patch)?;
        let delta = redondear(gasto.monto - anterior.monto);
        let concepto = format!("Ajuste gasto {}: {}", gasto.id, gasto.concepto);
        if delta > 0.0 {
            debitar(doc, gasto.origen_fondo, delta, &concepto, usuario_id)?;
        } else if delta < 0.0 {
            acreditar(doc, gasto.origen_fondo, -delta, &concepto, usuario_id)?;
        }
        if let (Some(pid), true) = (gasto.presupuesto_id, delta != 0.0) {
            ajustar_ejecucion(doc, pid, delta)?;
        }
        Ok(gasto)
    })
}

/// Deletes an expense, returning its amount to the fund and the budget.
pub fn eliminar_gasto(state: &AppState, id: u64, usuario_id: Option<u64>) -> AppResult<Gasto> {
    state.store.update(|doc| {
        let gasto = remove::<Gasto>(doc, id)?;
        acreditar(
            doc,
            gasto.origen_fondo,
            gasto.monto,
            &format!("Reverso gasto {}: {}", gasto.id, gasto.concepto),
            usuario_id,
        )?;
        if let Some(pid) = gasto.presupuesto_id {
            // The budget may have been deleted since.
            if buscar::<Presupuesto>(doc, pid).is_ok() {
                ajustar_ejecucion(doc, pid, -gasto.monto)?;
            }
        }
        Ok(gasto)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_execution_never_goes_negative() {
        let mut doc = Documento::default();
        let p = create(
            &mut doc,
            Presupuesto {
                id: 0,
                titulo: "Pintura".into(),
                descripcion: None,
                monto: 100.0,
                monto_ejecutado: 30.0,
                categoria: "mantenimiento".into(),
                anio: 2026,
                estado: Default::default(),
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        ajustar_ejecucion(&mut doc, p.id, -50.0).unwrap();
        assert_eq!(doc.presupuestos[0].monto_ejecutado, 0.0);
        ajustar_ejecucion(&mut doc, p.id, 12.345).unwrap();
        assert_eq!(doc.presupuestos[0].monto_ejecutado, 12.35);
    }
}
