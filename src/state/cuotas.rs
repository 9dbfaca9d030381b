use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{Cuota, Documento, EstadoCuota, Fondo, Fondos, Rol, TipoCuota, Usuario, redondear},
    schemas::{ActualizarCuotaInput, CrearCuotaInput, GenerarCuotasInput, PagoCuotaInput, to_patch},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove, update},
    fondos::{acreditar, validar_monto},
    salud::departamento_valido,
};

const DIA_VENCIMIENTO_POR_DEFECTO: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroCuotas {
    pub estado: Option<EstadoCuota>,
    pub departamento: Option<String>,
    pub mes: Option<u32>,
    pub anio: Option<i32>,
    pub tipo_cuota: Option<TipoCuota>,
}

impl FiltroCuotas {
    fn acepta(&self, c: &Cuota) -> bool {
        self.estado.is_none_or(|e| c.estado == e)
            && self.departamento.as_deref().is_none_or(|d| c.departamento == d)
            && self.mes.is_none_or(|m| c.mes == Some(m))
            && self.anio.is_none_or(|a| c.anio == Some(a))
            && self.tipo_cuota.is_none_or(|t| c.tipo_cuota == t)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumenCuotas {
    pub total: usize,
    pub pendientes: usize,
    pub pagadas: usize,
    pub vencidas: usize,
    pub monto_total: f64,
    pub monto_recaudado: f64,
    pub monto_pendiente: f64,
}

pub fn listar_cuotas(state: &AppState, filtro: &FiltroCuotas) -> Vec<Cuota> {
    state.store.read(|doc| {
        let mut items: Vec<Cuota> = doc
            .cuotas
            .iter()
            .filter(|c| filtro.acepta(c))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.fecha_vencimiento
                .cmp(&a.fecha_vencimiento)
                .then(a.departamento.cmp(&b.departamento))
        });
        items
    })
}

pub fn obtener_cuota(state: &AppState, id: u64) -> AppResult<Cuota> {
    state.store.read(|doc| buscar::<Cuota>(doc, id).cloned())
}

fn validar_departamento(depto: &str) -> AppResult<String> {
    let depto = depto.trim();
    if !departamento_valido(depto) {
        return Err(AppError::Validation(format!(
            "Departamento inválido: {depto}"
        )));
    }
    Ok(depto.to_string())
}

/// Tenant living in `depto`, if any.
fn inquilino_de(doc: &Documento, depto: &str) -> Option<u64> {
    doc.usuarios
        .iter()
        .find(|u| u.rol == Rol::Inquilino && u.departamento.as_deref() == Some(depto))
        .map(|u| u.id)
}

pub fn crear_cuota(state: &AppState, input: &CrearCuotaInput) -> AppResult<Cuota> {
    let departamento = validar_departamento(&input.departamento)?;
    let monto = validar_monto(input.monto, "El monto")?;
    let concepto = input.concepto.trim().to_string();
    if concepto.is_empty() {
        return Err(AppError::Validation("El concepto es obligatorio".to_string()));
    }

    state.store.update(|doc| {
        let usuario_id = match input.usuario_id {
            Some(id) => {
                let usuario = buscar::<Usuario>(doc, id)?;
                if usuario.departamento.as_deref() != Some(departamento.as_str()) {
                    return Err(AppError::Validation(format!(
                        "El usuario {id} no pertenece al departamento {departamento}"
                    )));
                }
                Some(id)
            }
            None => inquilino_de(doc, &departamento),
        };
        Ok(create(
            doc,
            Cuota {
                id: 0,
                usuario_id,
                departamento: departamento.clone(),
                concepto: concepto.clone(),
                monto,
                tipo_cuota: input.tipo_cuota.unwrap_or(TipoCuota::Mensual),
                mes: input.mes.or(Some(input.fecha_vencimiento.month())),
                anio: input.anio.or(Some(input.fecha_vencimiento.year())),
                fecha_vencimiento: input.fecha_vencimiento,
                estado: EstadoCuota::Pendiente,
                fecha_pago: None,
                metodo_pago: None,
                monto_pagado: 0.0,
                created_at: Utc::now(),
            },
        ))
    })
}

pub fn actualizar_cuota(
    state: &AppState,
    id: u64,
    input: &ActualizarCuotaInput,
    hoy: NaiveDate,
) -> AppResult<Cuota> {
    let patch = to_patch(input)?;
    state.store.update(|doc| {
        let (pagada, abonado) = {
            let actual = buscar::<Cuota>(doc, id)?;
            (actual.pagada(), actual.monto_pagado)
        };
        if pagada {
            return Err(AppError::Conflict(
                "No se puede modificar una cuota pagada".to_string(),
            ));
        }
        if let Some(monto) = input.monto {
            if redondear(monto) + 0.005 < abonado {
                return Err(AppError::Validation(format!(
                    "El monto no puede ser menor a lo ya abonado ({abonado:.2})"
                )));
            }
        }
        update::<Cuota>(doc, id, &patch)?;
        let cuota = buscar_mut::<Cuota>(doc, id)?;
        // Lowering monto to what was already paid settles the cuota.
        if cuota.monto_pagado > 0.0 && cuota.saldo_pendiente() <= 0.005 {
            cuota.monto_pagado = cuota.monto;
            cuota.estado = EstadoCuota::Pagado;
            cuota.fecha_pago = Some(Utc::now());
        } else if cuota.estado == EstadoCuota::Vencido && cuota.fecha_vencimiento >= hoy {
            cuota.estado = EstadoCuota::Pendiente;
        }
        Ok(cuota.clone())
    })
}

/// Cuotas with money already received cannot be deleted.
pub fn eliminar_cuota(state: &AppState, id: u64) -> AppResult<Cuota> {
    state.store.update(|doc| {
        let cuota = buscar::<Cuota>(doc, id)?;
        if cuota.monto_pagado > 0.0 {
            return Err(AppError::Conflict(
                "La cuota tiene pagos registrados y no puede eliminarse".to_string(),
            ));
        }
        remove::<Cuota>(doc, id)
    })
}

fn fecha_vencimiento(anio: i32, mes: u32, dia: u32) -> AppResult<NaiveDate> {
    let mut dia = dia.clamp(1, 31);
    loop {
        if let Some(fecha) = NaiveDate::from_ymd_opt(anio, mes, dia) {
            return Ok(fecha);
        }
        if dia <= 28 {
            return Err(AppError::Validation(format!("Fecha inválida: {anio}-{mes:02}")));
        }
        dia -= 1;
    }
}

fn generar_mes(
    doc: &mut Documento,
    mes: u32,
    anio: i32,
    monto: f64,
    dia: u32,
    concepto: Option<&str>,
) -> AppResult<Vec<Cuota>> {
    let vencimiento = fecha_vencimiento(anio, mes, dia)?;
    let inquilinos: Vec<(u64, String)> = doc
        .usuarios
        .iter()
        .filter(|u| u.activo && u.rol == Rol::Inquilino)
        .filter_map(|u| u.departamento.clone().map(|d| (u.id, d)))
        .collect();

    let mut creadas = Vec::new();
    for (usuario_id, departamento) in inquilinos {
        let existe = doc.cuotas.iter().any(|c| {
            c.departamento == departamento
                && c.tipo_cuota == TipoCuota::Mensual
                && c.mes == Some(mes)
                && c.anio == Some(anio)
        });
        if existe {
            continue;
        }
        let concepto = concepto
            .map(str::to_string)
            .unwrap_or_else(|| format!("Cuota de mantenimiento {mes:02}/{anio}"));
        creadas.push(create(
            doc,
            Cuota {
                id: 0,
                usuario_id: Some(usuario_id),
                departamento,
                concepto,
                monto,
                tipo_cuota: TipoCuota::Mensual,
                mes: Some(mes),
                anio: Some(anio),
                fecha_vencimiento: vencimiento,
                estado: EstadoCuota::Pendiente,
                fecha_pago: None,
                metodo_pago: None,
                monto_pagado: 0.0,
                created_at: Utc::now(),
            },
        ));
    }
    Ok(creadas)
}

/// Generates monthly cuotas for one month, or for all twelve when `mes` is absent.
/// Departamentos that already have a monthly cuota for the period are skipped.
pub fn generar_cuotas(state: &AppState, input: &GenerarCuotasInput) -> AppResult<Vec<Cuota>> {
    let monto = validar_monto(input.monto, "El monto")?;
    let dia = input.dia_vencimiento.unwrap_or(DIA_VENCIMIENTO_POR_DEFECTO);
    let meses: Vec<u32> = match input.mes {
        Some(mes) if (1..=12).contains(&mes) => vec![mes],
        Some(mes) => return Err(AppError::Validation(format!("Mes inválido: {mes}"))),
        None => (1..=12).collect(),
    };
    let concepto = input
        .concepto
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let creadas = state.store.update(|doc| {
        let mut creadas = Vec::new();
        for mes in meses {
            creadas.extend(generar_mes(doc, mes, input.anio, monto, dia, concepto)?);
        }
        Ok(creadas)
    })?;
    tracing::info!(anio = input.anio, mes = ?input.mes, creadas = creadas.len(), "cuotas generated");
    Ok(creadas)
}

/// Flips every PENDIENTE cuota due before `hoy` to VENCIDO and returns how many changed.
pub fn actualizar_vencidas(state: &AppState, hoy: NaiveDate) -> AppResult<usize> {
    let pendientes = state.store.read(|doc| {
        doc.cuotas
            .iter()
            .filter(|c| c.estado == EstadoCuota::Pendiente && c.fecha_vencimiento < hoy)
            .count()
    });
    if pendientes == 0 {
        return Ok(0);
    }
    state.store.update(|doc| {
        let mut cambiadas = 0;
        for c in doc.cuotas.iter_mut() {
            if c.estado == EstadoCuota::Pendiente && c.fecha_vencimiento < hoy {
                c.estado = EstadoCuota::Vencido;
                cambiadas += 1;
            }
        }
        Ok(cambiadas)
    })
}

/// Applies a payment to a cuota inside a document mutation. `mensual` cuotas are
/// paid in full into dineroOperacional; `fondo_mayor` cuotas take installments
/// into gastosMayores and become PAGADO when nothing is left.
pub(crate) fn aplicar_pago(
    doc: &mut Documento,
    id: u64,
    metodo_pago: &str,
    monto: Option<f64>,
    usuario_id: Option<u64>,
) -> AppResult<Cuota> {
    let (tipo, saldo, departamento) = {
        let cuota = buscar::<Cuota>(doc, id)?;
        if cuota.pagada() {
            return Err(AppError::Conflict(format!("La cuota {id} ya está pagada")));
        }
        (cuota.tipo_cuota, cuota.saldo_pendiente(), cuota.departamento.clone())
    };

    let abono = match (tipo, monto) {
        (TipoCuota::Mensual, Some(m)) if (redondear(m) - saldo).abs() > 0.005 => {
            return Err(AppError::Validation(format!(
                "Las cuotas mensuales se pagan completas ({saldo:.2})"
            )));
        }
        (TipoCuota::Mensual, _) => saldo,
        (TipoCuota::FondoMayor, Some(m)) => {
            let m = validar_monto(m, "El abono")?;
            if m > saldo + 0.005 {
                return Err(AppError::Validation(format!(
                    "El abono {m:.2} excede el saldo pendiente {saldo:.2}"
                )));
            }
            m
        }
        (TipoCuota::FondoMayor, None) => saldo,
    };

    let fondo = match tipo {
        TipoCuota::Mensual => Fondo::DineroOperacional,
        TipoCuota::FondoMayor => Fondo::GastosMayores,
    };
    acreditar(
        doc,
        fondo,
        abono,
        &format!("Pago cuota {id} depto {departamento}"),
        usuario_id,
    )?;

    let cuota = buscar_mut::<Cuota>(doc, id)?;
    cuota.monto_pagado = redondear(cuota.monto_pagado + abono);
    cuota.metodo_pago = Some(metodo_pago.trim().to_string());
    if cuota.saldo_pendiente() <= 0.005 {
        cuota.monto_pagado = cuota.monto;
        cuota.estado = EstadoCuota::Pagado;
        cuota.fecha_pago = Some(Utc::now());
    }
    Ok(cuota.clone())
}

pub fn pagar_cuota(
    state: &AppState,
    id: u64,
    input: &PagoCuotaInput,
    usuario_id: Option<u64>,
) -> AppResult<(Cuota, Fondos)> {
    if input.metodo_pago.trim().is_empty() {
        return Err(AppError::Validation("El método de pago es obligatorio".to_string()));
    }
    let (cuota, fondos) = state.store.update(|doc| {
        let cuota = aplicar_pago(doc, id, &input.metodo_pago, input.monto, usuario_id)?;
        Ok((cuota, doc.fondos.clone()))
    })?;
    tracing::info!(cuota_id = id, estado = cuota.estado.as_str(), "cuota payment applied");
    Ok((cuota, fondos))
}

pub fn resumen_cuotas(state: &AppState, filtro: &FiltroCuotas) -> ResumenCuotas {
    let cuotas = listar_cuotas(state, filtro);
    let mut resumen = ResumenCuotas::default();
    for c in &cuotas {
        resumen.total += 1;
        match c.estado {
            EstadoCuota::Pendiente => resumen.pendientes += 1,
            EstadoCuota::Pagado => resumen.pagadas += 1,
            EstadoCuota::Vencido => resumen.vencidas += 1,
        }
        resumen.monto_total += c.monto;
        resumen.monto_recaudado += c.monto_pagado;
        resumen.monto_pendiente += c.saldo_pendiente();
    }
    resumen.monto_total = redondear(resumen.monto_total);
    resumen.monto_recaudado = redondear(resumen.monto_recaudado);
    resumen.monto_pendiente = redondear(resumen.monto_pendiente);
    resumen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inquilino(doc: &mut Documento, depto: &str) -> u64 {
        create(
            doc,
            Usuario {
                id: 0,
                nombre: format!("Inquilino {depto}"),
                email: format!("i{depto}@test.com"),
                password: String::new(),
                rol: Rol::Inquilino,
                departamento: Some(depto.to_string()),
                telefono: None,
                permisos: Default::default(),
                activo: true,
                created_at: Utc::now(),
                updated_at: None,
            },
        )
        .id
    }

    fn cuota(doc: &mut Documento, tipo: TipoCuota, monto: f64) -> Cuota {
        create(
            doc,
            Cuota {
                id: 0,
                usuario_id: None,
                departamento: "101".to_string(),
                concepto: "Prueba".to_string(),
                monto,
                tipo_cuota: tipo,
                mes: Some(3),
                anio: Some(2026),
                fecha_vencimiento: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                estado: EstadoCuota::Pendiente,
                fecha_pago: None,
                metodo_pago: None,
                monto_pagado: 0.0,
                created_at: Utc::now(),
            },
        )
    }

    #[test]
    fn monthly_generation_skips_existing_departamentos() {
        let mut doc = Documento::default();
        inquilino(&mut doc, "101");
        inquilino(&mut doc, "102");
        let primera = generar_mes(&mut doc, 4, 2026, 550.0, 10, None).unwrap();
        assert_eq!(primera.len(), 2);
        let segunda = generar_mes(&mut doc, 4, 2026, 550.0, 10, None).unwrap();
        assert!(segunda.is_empty());
        assert_eq!(doc.cuotas.len(), 2);
    }

    #[test]
    fn due_day_is_clamped_to_month_length() {
        assert_eq!(
            fecha_vencimiento(2026, 2, 31).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
        );
    }

    #[test]
    fn monthly_payment_credits_operational_fund() {
        let mut doc = Documento::default();
        let c = cuota(&mut doc, TipoCuota::Mensual, 550.0);
        let pagada = aplicar_pago(&mut doc, c.id, "efectivo", None, None).unwrap();
        assert_eq!(pagada.estado, EstadoCuota::Pagado);
        assert!(pagada.fecha_pago.is_some());
        assert_eq!(pagada.monto_pagado, 550.0);
        assert_eq!(doc.fondos.dinero_operacional, 550.0);
        assert_eq!(doc.fondos.patrimonio_total, 550.0);

        let err = aplicar_pago(&mut doc, c.id, "efectivo", None, None).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn fondo_mayor_accepts_installments() {
        let mut doc = Documento::default();
        let c = cuota(&mut doc, TipoCuota::FondoMayor, 1000.0);
        let parcial = aplicar_pago(&mut doc, c.id, "transferencia", Some(400.0), None).unwrap();
        assert_eq!(parcial.estado, EstadoCuota::Pendiente);
        assert_eq!(parcial.saldo_pendiente(), 600.0);
        assert_eq!(doc.fondos.gastos_mayores, 400.0);

        let err = aplicar_pago(&mut doc, c.id, "transferencia", Some(700.0), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let final_ = aplicar_pago(&mut doc, c.id, "transferencia", None, None).unwrap();
        assert_eq!(final_.estado, EstadoCuota::Pagado);
        assert_eq!(doc.fondos.gastos_mayores, 1000.0);
    }
}
