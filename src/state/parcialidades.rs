use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{
        Cuota, EstadoParcialidad, Fondo, MetaParcialidades, Parcialidad, Rol, TipoCuota, Usuario,
        redondear,
    },
    schemas::{CrearParcialidadInput, MetaParcialidadesInput},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove},
    cuotas::aplicar_pago,
    fondos::{acreditar, validar_monto},
    salud::departamento_valido,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroParcialidades {
    pub departamento: Option<String>,
    pub anio: Option<i32>,
    pub estado: Option<EstadoParcialidad>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgresoDepartamento {
    pub departamento: String,
    pub validado: f64,
    pub pendiente_validacion: f64,
    pub meta: Option<f64>,
    pub restante: Option<f64>,
    pub porcentaje: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgresoParcialidades {
    pub anio: i32,
    pub meta_por_departamento: Option<f64>,
    pub total_validado: f64,
    pub total_pendiente_validacion: f64,
    pub departamentos: Vec<ProgresoDepartamento>,
}

pub fn listar_parcialidades(state: &AppState, filtro: &FiltroParcialidades) -> Vec<Parcialidad> {
    state.store.read(|doc| {
        let mut items: Vec<Parcialidad> = doc
            .parcialidades
            .iter()
            .filter(|p| {
                filtro.departamento.as_deref().is_none_or(|d| p.departamento == d)
                    && filtro.anio.is_none_or(|a| p.anio == a)
                    && filtro.estado.is_none_or(|e| p.estado == e)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.fecha_pago.cmp(&a.fecha_pago).then(b.id.cmp(&a.id)));
        items
    })
}

pub fn obtener_parcialidad(state: &AppState, id: u64) -> AppResult<Parcialidad> {
    state.store.read(|doc| buscar::<Parcialidad>(doc, id).cloned())
}

/// Registers an installment awaiting validation. Tenants always register for
/// their own departamento.
pub fn registrar_parcialidad(
    state: &AppState,
    input: &CrearParcialidadInput,
    autor: &Usuario,
) -> AppResult<Parcialidad> {
    let monto = validar_monto(input.monto, "El monto")?;
    let departamento = if autor.rol == Rol::Inquilino {
        autor.departamento.clone().ok_or_else(|| {
            AppError::Validation("El inquilino no tiene departamento asignado".to_string())
        })?
    } else {
        input
            .departamento
            .as_deref()
            .map(str::trim)
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("El departamento es obligatorio".to_string()))?
    };
    if !departamento_valido(&departamento) {
        return Err(AppError::Validation(format!(
            "Departamento inválido: {departamento}"
        )));
    }
    let fecha_pago = input.fecha_pago.unwrap_or_else(|| Utc::now().date_naive());

    state.store.update(|doc| {
        if let Some(cuota_id) = input.cuota_id {
            let cuota = buscar::<Cuota>(doc, cuota_id)?;
            if cuota.tipo_cuota != TipoCuota::FondoMayor {
                return Err(AppError::Validation(
                    "Solo se pueden vincular cuotas de fondo mayor".to_string(),
                ));
            }
            if cuota.departamento != departamento {
                return Err(AppError::Validation(format!(
                    "La cuota {cuota_id} no pertenece al departamento {departamento}"
                )));
            }
            if cuota.pagada() {
                return Err(AppError::Conflict(format!("La cuota {cuota_id} ya está pagada")));
            }
            if monto > cuota.saldo_pendiente() + 0.005 {
                return Err(AppError::Validation(format!(
                    "El monto excede el saldo pendiente de la cuota ({:.2})",
                    cuota.saldo_pendiente()
                )));
            }
        }
        let usuario_id = doc
            .usuarios
            .iter()
            .find(|u| u.rol == Rol::Inquilino && u.departamento.as_deref() == Some(departamento.as_str()))
            .map(|u| u.id);
        Ok(create(
            doc,
            Parcialidad {
                id: 0,
                departamento: departamento.clone(),
                usuario_id,
                anio: input.anio.unwrap_or(fecha_pago.year()),
                monto,
                fecha_pago,
                metodo_pago: input.metodo_pago.clone(),
                comprobante: input.comprobante.clone(),
                cuota_id: input.cuota_id,
                estado: EstadoParcialidad::Pendiente,
                validado_por: None,
                fecha_validacion: None,
                observaciones: None,
                created_at: Utc::now(),
            },
        ))
    })
}

/// Validates a pending installment and credits gastosMayores once. When linked to
/// a fondo_mayor cuota the amount is applied to it as an installment payment.
pub fn validar_parcialidad(state: &AppState, id: u64, validador_id: u64) -> AppResult<Parcialidad> {
    let parcialidad = state.store.update(|doc| {
        let pendiente = buscar::<Parcialidad>(doc, id)?.clone();
        if pendiente.estado != EstadoParcialidad::Pendiente {
            return Err(AppError::Conflict(format!(
                "La parcialidad {id} ya fue procesada"
            )));
        }
        match pendiente.cuota_id {
            Some(cuota_id) => {
                let metodo = pendiente.metodo_pago.as_deref().unwrap_or("parcialidad");
                aplicar_pago(doc, cuota_id, metodo, Some(pendiente.monto), Some(validador_id))?;
            }
            None => {
                acreditar(
                    doc,
                    Fondo::GastosMayores,
                    pendiente.monto,
                    &format!("Parcialidad {} depto {}", id, pendiente.departamento),
                    Some(validador_id),
                )?;
            }
        }
        let parcialidad = buscar_mut::<Parcialidad>(doc, id)?;
        parcialidad.estado = EstadoParcialidad::Validado;
        parcialidad.validado_por = Some(validador_id);
        parcialidad.fecha_validacion = Some(Utc::now());
        Ok(parcialidad.clone())
    })?;
    tracing::info!(parcialidad_id = id, monto = parcialidad.monto, "parcialidad validated");
    Ok(parcialidad)
}

pub fn rechazar_parcialidad(
    state: &AppState,
    id: u64,
    observaciones: Option<String>,
    validador_id: u64,
) -> AppResult<Parcialidad> {
    state.store.update(|doc| {
        let parcialidad = buscar_mut::<Parcialidad>(doc, id)?;
        if parcialidad.estado != EstadoParcialidad::Pendiente {
            return Err(AppError::Conflict(format!(
                "La parcialidad {id} ya fue procesada"
            )));
        }
        parcialidad.estado = EstadoParcialidad::Rechazado;
        parcialidad.validado_por = Some(validador_id);
        parcialidad.fecha_validacion = Some(Utc::now());
        parcialidad.observaciones = observaciones.filter(|o| !o.trim().is_empty());
        Ok(parcialidad.clone())
    })
}

/// Only pending installments can be deleted; validated ones are part of the funds.
pub fn eliminar_parcialidad(state: &AppState, id: u64) -> AppResult<Parcialidad> {
    state.store.update(|doc| {
        if buscar::<Parcialidad>(doc, id)?.estado == EstadoParcialidad::Validado {
            return Err(AppError::Conflict(
                "No se puede eliminar una parcialidad validada".to_string(),
            ));
        }
        remove::<Parcialidad>(doc, id)
    })
}

pub fn obtener_meta(state: &AppState) -> Option<MetaParcialidades> {
    state.store.read(|doc| doc.meta_parcialidades.clone())
}

pub fn definir_meta(state: &AppState, input: &MetaParcialidadesInput) -> AppResult<MetaParcialidades> {
    let monto = validar_monto(input.monto_por_departamento, "El monto por departamento")?;
    state.store.update(|doc| {
        let meta = MetaParcialidades {
            anio: input.anio,
            monto_por_departamento: monto,
            descripcion: input.descripcion.clone(),
        };
        doc.meta_parcialidades = Some(meta.clone());
        Ok(meta)
    })
}

/// Per-departamento totals for `anio` against the configured goal.
pub fn progreso_parcialidades(state: &AppState, anio: i32) -> ProgresoParcialidades {
    state.store.read(|doc| {
        let meta = doc
            .meta_parcialidades
            .as_ref()
            .filter(|m| m.anio == anio)
            .map(|m| m.monto_por_departamento);

        let mut por_depto: BTreeMap<String, (f64, f64)> = doc
            .usuarios
            .iter()
            .filter(|u| u.rol == Rol::Inquilino)
            .filter_map(|u| u.departamento.clone())
            .map(|d| (d, (0.0, 0.0)))
            .collect();
        for p in doc.parcialidades.iter().filter(|p| p.anio == anio) {
            let entrada = por_depto.entry(p.departamento.clone()).or_default();
            match p.estado {
                EstadoParcialidad::Validado => entrada.0 += p.monto,
                EstadoParcialidad::Pendiente => entrada.1 += p.monto,
                EstadoParcialidad::Rechazado => {}
            }
        }

        let departamentos: Vec<ProgresoDepartamento> = por_depto
            .into_iter()
            .map(|(departamento, (validado, pendiente))| {
                let validado = redondear(validado);
                ProgresoDepartamento {
                    departamento,
                    validado,
                    pendiente_validacion: redondear(pendiente),
                    meta,
                    restante: meta.map(|m| redondear((m - validado).max(0.0))),
                    porcentaje: meta.map(|m| redondear((validado / m * 100.0).min(100.0))),
                }
            })
            .collect();

        ProgresoParcialidades {
            anio,
            meta_por_departamento: meta,
            total_validado: redondear(departamentos.iter().map(|d| d.validado).sum()),
            total_pendiente_validacion: redondear(
                departamentos.iter().map(|d| d.pendiente_validacion).sum(),
            ),
            departamentos,
        }
    })
}
