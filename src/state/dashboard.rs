use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{
    Anuncio, Cuota, EstadoCuota, EstadoParcialidad, EstadoSolicitud, Fondos, Rol, Usuario,
    redondear,
};

use super::{
    AppState,
    cuotas::{FiltroCuotas, ResumenCuotas, resumen_cuotas},
    presupuestos::{AlertaPresupuesto, alertas_presupuestos},
};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardAdmin {
    pub cuotas: ResumenCuotas,
    pub recaudado_mes: f64,
    pub gastos_mes: f64,
    pub fondos: Fondos,
    pub alertas_presupuesto: Vec<AlertaPresupuesto>,
    pub solicitudes_pendientes: usize,
    pub parcialidades_pendientes: usize,
    pub inquilinos_activos: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardInquilino {
    pub departamento: Option<String>,
    pub cuotas: Vec<Cuota>,
    pub cuotas_vencidas: usize,
    pub saldo_pendiente: f64,
    pub anuncios: Vec<Anuncio>,
    pub solicitudes_abiertas: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Dashboard {
    Admin(DashboardAdmin),
    Inquilino(DashboardInquilino),
}

pub fn dashboard_admin(state: &AppState, hoy: NaiveDate) -> DashboardAdmin {
    let cuotas = resumen_cuotas(state, &FiltroCuotas::default());
    let alertas_presupuesto = alertas_presupuestos(state, Some(hoy.year()));
    state.store.read(|doc| {
        let mismo_mes = |fecha: NaiveDate| fecha.year() == hoy.year() && fecha.month() == hoy.month();
        let recaudado_mes: f64 = doc
            .cuotas
            .iter()
            .filter(|c| c.fecha_pago.is_some_and(|f| mismo_mes(f.date_naive())))
            .map(|c| c.monto_pagado)
            .sum();
        let gastos_mes: f64 = doc
            .gastos
            .iter()
            .filter(|g| mismo_mes(g.fecha))
            .map(|g| g.monto)
            .sum();
        DashboardAdmin {
            cuotas,
            recaudado_mes: redondear(recaudado_mes),
            gastos_mes: redondear(gastos_mes),
            fondos: doc.fondos.clone(),
            alertas_presupuesto,
            solicitudes_pendientes: doc
                .solicitudes
                .iter()
                .filter(|s| s.estado == EstadoSolicitud::Pendiente)
                .count(),
            parcialidades_pendientes: doc
                .parcialidades
                .iter()
                .filter(|p| p.estado == EstadoParcialidad::Pendiente)
                .count(),
            inquilinos_activos: doc
                .usuarios
                .iter()
                .filter(|u| u.activo && u.rol == Rol::Inquilino)
                .count(),
        }
    })
}

pub fn dashboard_inquilino(state: &AppState, usuario: &Usuario, hoy: NaiveDate) -> DashboardInquilino {
    state.store.read(|doc| {
        let mut cuotas: Vec<Cuota> = doc
            .cuotas
            .iter()
            .filter(|c| usuario.departamento.as_deref() == Some(c.departamento.as_str()))
            .cloned()
            .collect();
        cuotas.sort_by(|a, b| b.fecha_vencimiento.cmp(&a.fecha_vencimiento));
        let saldo_pendiente = cuotas
            .iter()
            .filter(|c| !c.pagada())
            .map(Cuota::saldo_pendiente)
            .sum::<f64>();
        DashboardInquilino {
            departamento: usuario.departamento.clone(),
            cuotas_vencidas: cuotas
                .iter()
                .filter(|c| c.estado == EstadoCuota::Vencido)
                .count(),
            saldo_pendiente: redondear(saldo_pendiente),
            cuotas,
            anuncios: doc
                .anuncios
                .iter()
                .filter(|a| a.vigente(hoy))
                .cloned()
                .collect(),
            solicitudes_abiertas: doc
                .solicitudes
                .iter()
                .filter(|s| {
                    s.usuario_id == usuario.id
                        && matches!(s.estado, EstadoSolicitud::Pendiente | EstadoSolicitud::EnProceso)
                })
                .count(),
        }
    })
}

/// Managers get the building overview; tenants their own account.
pub fn dashboard(state: &AppState, usuario: &Usuario, hoy: NaiveDate) -> Dashboard {
    if usuario.rol == Rol::Inquilino {
        Dashboard::Inquilino(dashboard_inquilino(state, usuario, hoy))
    } else {
        Dashboard::Admin(dashboard_admin(state, hoy))
    }
}
