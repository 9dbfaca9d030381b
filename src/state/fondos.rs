use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{Documento, Fondo, Fondos, MovimientoFondo, TipoMovimiento, redondear},
};

use super::{AppState, coleccion::create};

pub fn parse_fondo(valor: &str) -> AppResult<Fondo> {
    Fondo::parse(valor).ok_or_else(|| AppError::Validation(format!("Fondo inválido: {valor}")))
}

pub(crate) fn validar_monto(monto: f64, etiqueta: &str) -> AppResult<f64> {
    if !monto.is_finite() || monto <= 0.0 {
        return Err(AppError::Validation(format!(
            "{etiqueta} debe ser mayor que cero"
        )));
    }
    Ok(redondear(monto))
}

fn registrar_movimiento(
    doc: &mut Documento,
    tipo: TipoMovimiento,
    origen: Option<Fondo>,
    destino: Option<Fondo>,
    monto: f64,
    concepto: &str,
    usuario_id: Option<u64>,
) -> MovimientoFondo {
    create(
        doc,
        MovimientoFondo {
            id: 0,
            tipo,
            origen,
            destino,
            monto,
            concepto: concepto.to_string(),
            usuario_id,
            fecha: Utc::now(),
        },
    )
}

/// Adds `monto` to a fund and records the movement.
pub fn acreditar(
    doc: &mut Documento,
    fondo: Fondo,
    monto: f64,
    concepto: &str,
    usuario_id: Option<u64>,
) -> AppResult<MovimientoFondo> {
    let monto = validar_monto(monto, "Monto")?;
    let saldo = doc.fondos.saldo_mut(fondo);
    *saldo = redondear(*saldo + monto);
    doc.fondos.recalcular_patrimonio();
    Ok(registrar_movimiento(
        doc,
        TipoMovimiento::Ingreso,
        None,
        Some(fondo),
        monto,
        concepto,
        usuario_id,
    ))
}

/// Takes `monto` out of a fund; fails without touching it when the balance is short.
pub fn debitar(
    doc: &mut Documento,
    fondo: Fondo,
    monto: f64,
    concepto: &str,
    usuario_id: Option<u64>,
) -> AppResult<MovimientoFondo> {
    let monto = validar_monto(monto, "Monto")?;
    let disponible = doc.fondos.saldo(fondo);
    if disponible + 0.005 < monto {
        return Err(AppError::Validation(format!(
            "Saldo insuficiente en {}: disponible {:.2}, requerido {:.2}",
            fondo.as_str(),
            disponible,
            monto
        )));
    }
    let saldo = doc.fondos.saldo_mut(fondo);
    *saldo = redondear(*saldo - monto);
    doc.fondos.recalcular_patrimonio();
    Ok(registrar_movimiento(
        doc,
        TipoMovimiento::Egreso,
        Some(fondo),
        None,
        monto,
        concepto,
        usuario_id,
    ))
}

/// Moves `monto` between two funds inside one document mutation.
pub fn mover_entre_fondos(
    doc: &mut Documento,
    origen: Fondo,
    destino: Fondo,
    monto: f64,
    concepto: &str,
    usuario_id: Option<u64>,
) -> AppResult<MovimientoFondo> {
    if origen == destino {
        return Err(AppError::Validation(
            "El fondo de origen y destino deben ser distintos".to_string(),
        ));
    }
    let monto = validar_monto(monto, "Monto")?;
    let disponible = doc.fondos.saldo(origen);
    if disponible + 0.005 < monto {
        return Err(AppError::Validation(format!(
            "Saldo insuficiente en {}: disponible {:.2}, requerido {:.2}",
            origen.as_str(),
            disponible,
            monto
        )));
    }
    {
        let saldo = doc.fondos.saldo_mut(origen);
        *saldo = redondear(*saldo - monto);
    }
    {
        let saldo = doc.fondos.saldo_mut(destino);
        *saldo = redondear(*saldo + monto);
    }
    doc.fondos.recalcular_patrimonio();
    Ok(registrar_movimiento(
        doc,
        TipoMovimiento::Transferencia,
        Some(origen),
        Some(destino),
        monto,
        concepto,
        usuario_id,
    ))
}

pub fn obtener_fondos(state: &AppState) -> Fondos {
    state.store.read(|doc| doc.fondos.clone())
}

pub fn transferir_entre_fondos(
    state: &AppState,
    origen: &str,
    destino: &str,
    monto: f64,
    concepto: Option<String>,
    usuario_id: Option<u64>,
) -> AppResult<(Fondos, MovimientoFondo)> {
    let origen = parse_fondo(origen)?;
    let destino = parse_fondo(destino)?;
    let concepto = concepto
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| format!("Transferencia {} -> {}", origen.as_str(), destino.as_str()));

    state.store.update(|doc| {
        let movimiento = mover_entre_fondos(doc, origen, destino, monto, &concepto, usuario_id)?;
        Ok((doc.fondos.clone(), movimiento))
    })
}

/// Sets a fund to an exact balance (manual correction), recorded as `ajuste`.
pub fn ajustar_fondo(
    state: &AppState,
    fondo: &str,
    saldo: f64,
    motivo: &str,
    usuario_id: Option<u64>,
) -> AppResult<(Fondos, MovimientoFondo)> {
    let fondo = parse_fondo(fondo)?;
    if !saldo.is_finite() || saldo < 0.0 {
        return Err(AppError::Validation(
            "El saldo no puede ser negativo".to_string(),
        ));
    }
    if motivo.trim().is_empty() {
        return Err(AppError::Validation(
            "El motivo del ajuste es obligatorio".to_string(),
        ));
    }
    let saldo = redondear(saldo);

    state.store.update(|doc| {
        let anterior = doc.fondos.saldo(fondo);
        *doc.fondos.saldo_mut(fondo) = saldo;
        doc.fondos.recalcular_patrimonio();
        let diferencia = redondear(saldo - anterior);
        let (origen, destino) = if diferencia < 0.0 {
            (Some(fondo), None)
        } else {
            (None, Some(fondo))
        };
        let movimiento = registrar_movimiento(
            doc,
            TipoMovimiento::Ajuste,
            origen,
            destino,
            diferencia.abs(),
            motivo.trim(),
            usuario_id,
        );
        Ok((doc.fondos.clone(), movimiento))
    })
}

pub fn listar_movimientos(state: &AppState, fondo: Option<Fondo>) -> Vec<MovimientoFondo> {
    state.store.read(|doc| {
        let mut items: Vec<MovimientoFondo> = doc
            .movimientos_fondos
            .iter()
            .filter(|m| {
                fondo.is_none_or(|f| m.origen == Some(f) || m.destino == Some(f))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        items
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_con_fondos() -> Documento {
        let mut doc = Documento::default();
        doc.fondos = Fondos {
            ahorro_acumulado: 1000.0,
            gastos_mayores: 500.0,
            dinero_operacional: 250.0,
            patrimonio_total: 1750.0,
        };
        doc
    }

    #[test]
    fn transfer_moves_exact_amount() {
        let mut doc = doc_con_fondos();
        let mov = mover_entre_fondos(
            &mut doc,
            Fondo::AhorroAcumulado,
            Fondo::DineroOperacional,
            300.0,
            "prueba",
            None,
        )
        .unwrap();
        assert_eq!(doc.fondos.ahorro_acumulado, 700.0);
        assert_eq!(doc.fondos.dinero_operacional, 550.0);
        assert_eq!(doc.fondos.patrimonio_total, 1750.0);
        assert_eq!(mov.tipo, TipoMovimiento::Transferencia);
        assert_eq!(doc.movimientos_fondos.len(), 1);
    }

    #[test]
    fn transfer_over_balance_leaves_funds_unchanged() {
        let mut doc = doc_con_fondos();
        let antes = doc.fondos.clone();
        let err = mover_entre_fondos(
            &mut doc,
            Fondo::DineroOperacional,
            Fondo::GastosMayores,
            250.01,
            "prueba",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(doc.fondos, antes);
        assert!(doc.movimientos_fondos.is_empty());
    }

    #[test]
    fn same_fund_and_non_positive_amounts_are_rejected() {
        let mut doc = doc_con_fondos();
        assert!(
            mover_entre_fondos(&mut doc, Fondo::GastosMayores, Fondo::GastosMayores, 1.0, "x", None)
                .is_err()
        );
        assert!(acreditar(&mut doc, Fondo::GastosMayores, 0.0, "x", None).is_err());
        assert!(debitar(&mut doc, Fondo::GastosMayores, -3.0, "x", None).is_err());
    }

    #[test]
    fn fund_names_parse_case_insensitively() {
        assert_eq!(parse_fondo("gastosMayores").unwrap(), Fondo::GastosMayores);
        assert_eq!(parse_fondo("DINEROOPERACIONAL").unwrap(), Fondo::DineroOperacional);
        assert!(parse_fondo("caja_chica").is_err());
    }
}
