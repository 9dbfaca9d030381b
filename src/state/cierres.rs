use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::{
        Cierre, DetalleCierre, Documento, EstadoCuota, EstadoParcialidad, Fondo, TipoCierre,
        redondear,
    },
    schemas::CierreInput,
};

use super::{
    AppState,
    coleccion::{buscar, create},
    fondos::mover_entre_fondos,
};

/// Closing period with inclusive bounds.
#[derive(Debug, Clone, PartialEq)]
struct Periodo {
    etiqueta: String,
    tipo: TipoCierre,
    anio: i32,
    mes: Option<u32>,
    inicio: NaiveDate,
    fin: NaiveDate,
}

impl Periodo {
    fn desde_input(input: &CierreInput) -> AppResult<Self> {
        let invalido = || AppError::Validation("Periodo inválido".to_string());
        match (input.tipo, input.mes) {
            (TipoCierre::Mensual, Some(mes)) => {
                let inicio = NaiveDate::from_ymd_opt(input.anio, mes, 1).ok_or_else(invalido)?;
                let siguiente = if mes == 12 {
                    NaiveDate::from_ymd_opt(input.anio + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(input.anio, mes + 1, 1)
                }
                .ok_or_else(invalido)?;
                Ok(Periodo {
                    etiqueta: format!("{}-{:02}", input.anio, mes),
                    tipo: TipoCierre::Mensual,
                    anio: input.anio,
                    mes: Some(mes),
                    inicio,
                    fin: siguiente.pred_opt().ok_or_else(invalido)?,
                })
            }
            (TipoCierre::Mensual, None) => Err(AppError::Validation(
                "El cierre mensual requiere el mes".to_string(),
            )),
            (TipoCierre::Anual, _) => Ok(Periodo {
                etiqueta: input.anio.to_string(),
                tipo: TipoCierre::Anual,
                anio: input.anio,
                mes: None,
                inicio: NaiveDate::from_ymd_opt(input.anio, 1, 1).ok_or_else(invalido)?,
                fin: NaiveDate::from_ymd_opt(input.anio, 12, 31).ok_or_else(invalido)?,
            }),
        }
    }

    fn contiene(&self, fecha: NaiveDate) -> bool {
        fecha >= self.inicio && fecha <= self.fin
    }

    fn incluye_cuota(&self, anio: Option<i32>, mes: Option<u32>) -> bool {
        anio == Some(self.anio) && (self.mes.is_none() || mes == self.mes)
    }
}

/// Figures of a period, computed without closing it.
#[derive(Debug, Clone, Serialize)]
pub struct BalancePeriodo {
    pub periodo: String,
    pub tipo: TipoCierre,
    pub ingresos: f64,
    pub egresos: f64,
    pub saldo: f64,
    pub detalles: DetalleCierre,
}

fn calcular(doc: &Documento, periodo: &Periodo) -> BalancePeriodo {
    let mut detalles = DetalleCierre {
        fondos: doc.fondos.clone(),
        ..Default::default()
    };
    let mut ingresos = 0.0;

    for c in doc.cuotas.iter() {
        if c.estado == EstadoCuota::Pagado
            && c.fecha_pago.is_some_and(|f| periodo.contiene(f.date_naive()))
        {
            ingresos += c.monto_pagado;
        }
        if periodo.incluye_cuota(c.anio, c.mes) {
            match c.estado {
                EstadoCuota::Pagado => detalles.cuotas_pagadas += 1,
                EstadoCuota::Pendiente => detalles.cuotas_pendientes += 1,
                EstadoCuota::Vencido => detalles.cuotas_vencidas += 1,
            }
        }
    }

    for p in doc.parcialidades.iter() {
        if p.estado == EstadoParcialidad::Validado && periodo.contiene(p.fecha_pago) {
            detalles.parcialidades_validadas += 1;
            // Parcialidades tied to a cuota are already counted through it.
            if p.cuota_id.is_none() {
                ingresos += p.monto;
            }
        }
    }

    let mut egresos = 0.0;
    let mut por_categoria: BTreeMap<String, f64> = BTreeMap::new();
    for g in doc.gastos.iter().filter(|g| periodo.contiene(g.fecha)) {
        egresos += g.monto;
        *por_categoria.entry(g.categoria.clone()).or_default() += g.monto;
    }
    detalles.gastos_por_categoria = por_categoria
        .into_iter()
        .map(|(k, v)| (k, redondear(v)))
        .collect();

    let ingresos = redondear(ingresos);
    let egresos = redondear(egresos);
    BalancePeriodo {
        periodo: periodo.etiqueta.clone(),
        tipo: periodo.tipo,
        ingresos,
        egresos,
        saldo: redondear(ingresos - egresos),
        detalles,
    }
}

pub fn listar_cierres(state: &AppState, tipo: Option<TipoCierre>) -> Vec<Cierre> {
    state.store.read(|doc| {
        let mut items: Vec<Cierre> = doc
            .cierres
            .iter()
            .filter(|c| tipo.is_none_or(|t| c.tipo == t))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.periodo.cmp(&a.periodo));
        items
    })
}

pub fn obtener_cierre(state: &AppState, id: u64) -> AppResult<Cierre> {
    state.store.read(|doc| buscar::<Cierre>(doc, id).cloned())
}

pub fn balance_periodo(state: &AppState, input: &CierreInput) -> AppResult<BalancePeriodo> {
    let periodo = Periodo::desde_input(input)?;
    Ok(state.store.read(|doc| calcular(doc, &periodo)))
}

/// Closes a month or a year. A period can only be closed once. Annual closures
/// may move what is left in dineroOperacional into ahorroAcumulado.
pub fn cerrar_periodo(
    state: &AppState,
    input: &CierreInput,
    usuario_id: Option<u64>,
) -> AppResult<Cierre> {
    let periodo = Periodo::desde_input(input)?;
    if input.transferir_saldo && periodo.tipo != TipoCierre::Anual {
        return Err(AppError::Validation(
            "Solo el cierre anual puede transferir saldo al ahorro".to_string(),
        ));
    }
    let hoy = Utc::now().date_naive();
    if periodo.inicio > hoy {
        return Err(AppError::Validation(format!(
            "No se puede cerrar un periodo futuro ({})",
            periodo.etiqueta
        )));
    }

    let cierre = state.store.update(|doc| {
        if doc
            .cierres
            .iter()
            .any(|c| c.tipo == periodo.tipo && c.periodo == periodo.etiqueta)
        {
            return Err(AppError::Conflict(format!(
                "El periodo {} ya fue cerrado",
                periodo.etiqueta
            )));
        }

        let mut balance = calcular(doc, &periodo);
        if input.transferir_saldo {
            let restante = doc.fondos.saldo(Fondo::DineroOperacional);
            if restante > 0.0 {
                mover_entre_fondos(
                    doc,
                    Fondo::DineroOperacional,
                    Fondo::AhorroAcumulado,
                    restante,
                    &format!("Cierre anual {}", periodo.etiqueta),
                    usuario_id,
                )?;
                balance.detalles.transferencia_a_ahorro = Some(redondear(restante));
                balance.detalles.fondos = doc.fondos.clone();
            }
        }

        Ok(create(
            doc,
            Cierre {
                id: 0,
                periodo: balance.periodo,
                tipo: balance.tipo,
                ingresos: balance.ingresos,
                egresos: balance.egresos,
                saldo: balance.saldo,
                detalles: balance.detalles,
                created_by: usuario_id,
                created_at: Utc::now(),
            },
        ))
    })?;
    tracing::info!(periodo = %cierre.periodo, saldo = cierre.saldo, "period closed");
    Ok(cierre)
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;

    fn input(tipo: TipoCierre, anio: i32, mes: Option<u32>) -> CierreInput {
        CierreInput {
            tipo,
            anio,
            mes,
            transferir_saldo: false,
        }
    }

    #[test]
    fn monthly_period_bounds() {
        let p = Periodo::desde_input(&input(TipoCierre::Mensual, 2024, Some(2))).unwrap();
        assert_eq!(p.etiqueta, "2024-02");
        assert_eq!(p.fin, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let dic = Periodo::desde_input(&input(TipoCierre::Mensual, 2025, Some(12))).unwrap();
        assert_eq!(dic.fin, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(Periodo::desde_input(&input(TipoCierre::Mensual, 2025, None)).is_err());
    }

    #[test]
    fn annual_period_covers_the_year() {
        let p = Periodo::desde_input(&input(TipoCierre::Anual, 2025, None)).unwrap();
        assert_eq!(p.etiqueta, "2025");
        assert!(p.contiene(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()));
        assert!(!p.contiene(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(p.incluye_cuota(Some(2025), Some(7)));
        assert_eq!(p.inicio.year(), 2025);
    }
}
