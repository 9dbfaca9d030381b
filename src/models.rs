// models.rs
// Domain models persisted in data.json (one document, one array per collection).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Rounds a currency amount to cents.
pub fn redondear(valor: f64) -> f64 {
    (valor * 100.0).round() / 100.0
}

/// User roles for authorization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rol {
    Admin,
    Comite,
    Inquilino,
}

impl Rol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rol::Admin => "ADMIN",
            Rol::Comite => "COMITE",
            Rol::Inquilino => "INQUILINO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ADMIN" => Some(Rol::Admin),
            "COMITE" => Some(Rol::Comite),
            "INQUILINO" => Some(Rol::Inquilino),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Rol::Admin)
    }
}

impl Default for Rol {
    fn default() -> Self {
        Rol::Inquilino
    }
}

/// Areas a COMITE member can be granted write access to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Permiso {
    Usuarios,
    Cuotas,
    Gastos,
    Presupuestos,
    Anuncios,
    Cierres,
    Fondos,
    Solicitudes,
    Parcialidades,
}

impl Permiso {
    pub const TODOS: [Permiso; 9] = [
        Permiso::Usuarios,
        Permiso::Cuotas,
        Permiso::Gastos,
        Permiso::Presupuestos,
        Permiso::Anuncios,
        Permiso::Cierres,
        Permiso::Fondos,
        Permiso::Solicitudes,
        Permiso::Parcialidades,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permiso::Usuarios => "usuarios",
            Permiso::Cuotas => "cuotas",
            Permiso::Gastos => "gastos",
            Permiso::Presupuestos => "presupuestos",
            Permiso::Anuncios => "anuncios",
            Permiso::Cierres => "cierres",
            Permiso::Fondos => "fondos",
            Permiso::Solicitudes => "solicitudes",
            Permiso::Parcialidades => "parcialidades",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    pub id: u64,
    pub nombre: String,
    pub email: String,
    /// Salted hash, see `password.rs`.
    pub password: String,
    pub rol: Rol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departamento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permisos: BTreeMap<Permiso, bool>,
    #[serde(default = "default_true")]
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Usuario {
    pub fn tiene_permiso(&self, permiso: Permiso) -> bool {
        match self.rol {
            Rol::Admin => true,
            Rol::Comite => self.permisos.get(&permiso).copied().unwrap_or(false),
            Rol::Inquilino => false,
        }
    }

    pub fn publico(&self) -> UsuarioPublico {
        UsuarioPublico {
            id: self.id,
            nombre: self.nombre.clone(),
            email: self.email.clone(),
            rol: self.rol,
            departamento: self.departamento.clone(),
            telefono: self.telefono.clone(),
            permisos: self.permisos.clone(),
            activo: self.activo,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// User as returned by the API (never carries the password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsuarioPublico {
    pub id: u64,
    pub nombre: String,
    pub email: String,
    pub rol: Rol,
    pub departamento: Option<String>,
    pub telefono: Option<String>,
    pub permisos: BTreeMap<Permiso, bool>,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TipoCuota {
    Mensual,
    FondoMayor,
}

impl TipoCuota {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoCuota::Mensual => "mensual",
            TipoCuota::FondoMayor => "fondo_mayor",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EstadoCuota {
    Pendiente,
    Pagado,
    Vencido,
}

impl EstadoCuota {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoCuota::Pendiente => "PENDIENTE",
            EstadoCuota::Pagado => "PAGADO",
            EstadoCuota::Vencido => "VENCIDO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDIENTE" => Some(EstadoCuota::Pendiente),
            "PAGADO" => Some(EstadoCuota::Pagado),
            "VENCIDO" => Some(EstadoCuota::Vencido),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cuota {
    pub id: u64,
    #[serde(default)]
    pub usuario_id: Option<u64>,
    pub departamento: String,
    pub concepto: String,
    pub monto: f64,
    pub tipo_cuota: TipoCuota,
    #[serde(default)]
    pub mes: Option<u32>,
    #[serde(default)]
    pub anio: Option<i32>,
    pub fecha_vencimiento: NaiveDate,
    pub estado: EstadoCuota,
    #[serde(default)]
    pub fecha_pago: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metodo_pago: Option<String>,
    #[serde(default)]
    pub monto_pagado: f64,
    pub created_at: DateTime<Utc>,
}

impl Cuota {
    pub fn saldo_pendiente(&self) -> f64 {
        redondear((self.monto - self.monto_pagado).max(0.0))
    }

    pub fn pagada(&self) -> bool {
        self.estado == EstadoCuota::Pagado
    }
}

/// The three named funds of the condominium.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Fondo {
    AhorroAcumulado,
    GastosMayores,
    DineroOperacional,
}

impl Fondo {
    pub const TODOS: [Fondo; 3] = [
        Fondo::AhorroAcumulado,
        Fondo::GastosMayores,
        Fondo::DineroOperacional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Fondo::AhorroAcumulado => "ahorroAcumulado",
            Fondo::GastosMayores => "gastosMayores",
            Fondo::DineroOperacional => "dineroOperacional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Fondo::TODOS
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fondos {
    #[serde(default)]
    pub ahorro_acumulado: f64,
    #[serde(default)]
    pub gastos_mayores: f64,
    #[serde(default)]
    pub dinero_operacional: f64,
    #[serde(default)]
    pub patrimonio_total: f64,
}

impl Fondos {
    pub fn saldo(&self, fondo: Fondo) -> f64 {
        match fondo {
            Fondo::AhorroAcumulado => self.ahorro_acumulado,
            Fondo::GastosMayores => self.gastos_mayores,
            Fondo::DineroOperacional => self.dinero_operacional,
        }
    }

    pub fn saldo_mut(&mut self, fondo: Fondo) -> &mut f64 {
        match fondo {
            Fondo::AhorroAcumulado => &mut self.ahorro_acumulado,
            Fondo::GastosMayores => &mut self.gastos_mayores,
            Fondo::DineroOperacional => &mut self.dinero_operacional,
        }
    }

    pub fn total_calculado(&self) -> f64 {
        redondear(self.ahorro_acumulado + self.gastos_mayores + self.dinero_operacional)
    }

    pub fn recalcular_patrimonio(&mut self) {
        self.patrimonio_total = self.total_calculado();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TipoMovimiento {
    Ingreso,
    Egreso,
    Transferencia,
    Ajuste,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovimientoFondo {
    pub id: u64,
    pub tipo: TipoMovimiento,
    #[serde(default)]
    pub origen: Option<Fondo>,
    #[serde(default)]
    pub destino: Option<Fondo>,
    pub monto: f64,
    pub concepto: String,
    #[serde(default)]
    pub usuario_id: Option<u64>,
    pub fecha: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gasto {
    pub id: u64,
    pub concepto: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub categoria: String,
    pub monto: f64,
    pub fecha: NaiveDate,
    #[serde(default)]
    pub proveedor: Option<String>,
    pub origen_fondo: Fondo,
    #[serde(default)]
    pub presupuesto_id: Option<u64>,
    #[serde(default)]
    pub comprobante: Option<String>,
    #[serde(default)]
    pub created_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EstadoPresupuesto {
    Borrador,
    Aprobado,
    Rechazado,
}

impl Default for EstadoPresupuesto {
    fn default() -> Self {
        EstadoPresupuesto::Borrador
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presupuesto {
    pub id: u64,
    pub titulo: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub monto: f64,
    #[serde(default)]
    pub monto_ejecutado: f64,
    pub categoria: String,
    pub anio: i32,
    #[serde(default)]
    pub estado: EstadoPresupuesto,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TipoAnuncio {
    General,
    Urgente,
    Mantenimiento,
    Evento,
}

impl Default for TipoAnuncio {
    fn default() -> Self {
        TipoAnuncio::General
    }
}

/// Metadata of a file uploaded with an announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivoAdjunto {
    pub nombre_original: String,
    pub nombre_archivo: String,
    pub mime: String,
    pub tamano: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anuncio {
    pub id: u64,
    pub titulo: String,
    pub contenido: String,
    #[serde(default)]
    pub tipo: TipoAnuncio,
    pub autor_id: u64,
    #[serde(default = "default_true")]
    pub activo: bool,
    #[serde(default)]
    pub archivos: Vec<ArchivoAdjunto>,
    #[serde(default)]
    pub fecha_expiracion: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Anuncio {
    pub fn vigente(&self, hoy: NaiveDate) -> bool {
        self.activo && self.fecha_expiracion.is_none_or(|fecha| fecha >= hoy)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstadoSolicitud {
    Pendiente,
    EnProceso,
    Resuelta,
    Rechazada,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solicitud {
    pub id: u64,
    pub usuario_id: u64,
    #[serde(default)]
    pub departamento: Option<String>,
    pub titulo: String,
    pub descripcion: String,
    pub estado: EstadoSolicitud,
    #[serde(default)]
    pub respuesta: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TipoCierre {
    Mensual,
    Anual,
}

/// Snapshot stored with every closure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetalleCierre {
    pub cuotas_pagadas: usize,
    pub cuotas_pendientes: usize,
    pub cuotas_vencidas: usize,
    pub parcialidades_validadas: usize,
    pub gastos_por_categoria: BTreeMap<String, f64>,
    pub fondos: Fondos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transferencia_a_ahorro: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cierre {
    pub id: u64,
    pub periodo: String,
    pub tipo: TipoCierre,
    pub ingresos: f64,
    pub egresos: f64,
    pub saldo: f64,
    pub detalles: DetalleCierre,
    #[serde(default)]
    pub created_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EstadoParcialidad {
    Pendiente,
    Validado,
    Rechazado,
}

/// Installment paid by a departamento toward the fund goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcialidad {
    pub id: u64,
    pub departamento: String,
    #[serde(default)]
    pub usuario_id: Option<u64>,
    pub anio: i32,
    pub monto: f64,
    pub fecha_pago: NaiveDate,
    #[serde(default)]
    pub metodo_pago: Option<String>,
    #[serde(default)]
    pub comprobante: Option<String>,
    #[serde(default)]
    pub cuota_id: Option<u64>,
    pub estado: EstadoParcialidad,
    #[serde(default)]
    pub validado_por: Option<u64>,
    #[serde(default)]
    pub fecha_validacion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub observaciones: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaParcialidades {
    pub anio: i32,
    pub monto_por_departamento: f64,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// Collections that draw ids from `nextId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coleccion {
    Usuarios,
    Cuotas,
    Gastos,
    Presupuestos,
    Anuncios,
    Solicitudes,
    Cierres,
    Parcialidades,
    MovimientosFondos,
}

impl Coleccion {
    pub fn nombre(&self) -> &'static str {
        match self {
            Coleccion::Usuarios => "usuarios",
            Coleccion::Cuotas => "cuotas",
            Coleccion::Gastos => "gastos",
            Coleccion::Presupuestos => "presupuestos",
            Coleccion::Anuncios => "anuncios",
            Coleccion::Solicitudes => "solicitudes",
            Coleccion::Cierres => "cierres",
            Coleccion::Parcialidades => "parcialidades",
            Coleccion::MovimientosFondos => "movimientos_fondos",
        }
    }
}

/// Per-collection id counters. Each holds the id the next created entity receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NextId {
    pub usuarios: u64,
    pub cuotas: u64,
    pub gastos: u64,
    pub presupuestos: u64,
    pub anuncios: u64,
    pub solicitudes: u64,
    pub cierres: u64,
    pub parcialidades: u64,
    pub movimientos_fondos: u64,
}

impl Default for NextId {
    fn default() -> Self {
        NextId {
            usuarios: 1,
            cuotas: 1,
            gastos: 1,
            presupuestos: 1,
            anuncios: 1,
            solicitudes: 1,
            cierres: 1,
            parcialidades: 1,
            movimientos_fondos: 1,
        }
    }
}

impl NextId {
    fn contador(&mut self, coleccion: Coleccion) -> &mut u64 {
        match coleccion {
            Coleccion::Usuarios => &mut self.usuarios,
            Coleccion::Cuotas => &mut self.cuotas,
            Coleccion::Gastos => &mut self.gastos,
            Coleccion::Presupuestos => &mut self.presupuestos,
            Coleccion::Anuncios => &mut self.anuncios,
            Coleccion::Solicitudes => &mut self.solicitudes,
            Coleccion::Cierres => &mut self.cierres,
            Coleccion::Parcialidades => &mut self.parcialidades,
            Coleccion::MovimientosFondos => &mut self.movimientos_fondos,
        }
    }

    pub fn valor(&self, coleccion: Coleccion) -> u64 {
        match coleccion {
            Coleccion::Usuarios => self.usuarios,
            Coleccion::Cuotas => self.cuotas,
            Coleccion::Gastos => self.gastos,
            Coleccion::Presupuestos => self.presupuestos,
            Coleccion::Anuncios => self.anuncios,
            Coleccion::Solicitudes => self.solicitudes,
            Coleccion::Cierres => self.cierres,
            Coleccion::Parcialidades => self.parcialidades,
            Coleccion::MovimientosFondos => self.movimientos_fondos,
        }
    }

    /// Returns the current counter value and advances it by one.
    pub fn siguiente(&mut self, coleccion: Coleccion) -> u64 {
        let contador = self.contador(coleccion);
        let id = *contador;
        *contador += 1;
        id
    }

    /// Lifts the counter so it is strictly greater than `max_id`.
    pub fn asegurar_mayor_que(&mut self, coleccion: Coleccion, max_id: u64) {
        let contador = self.contador(coleccion);
        if *contador <= max_id {
            *contador = max_id + 1;
        }
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Documento {
    #[serde(default)]
    pub usuarios: Vec<Usuario>,
    #[serde(default)]
    pub cuotas: Vec<Cuota>,
    #[serde(default)]
    pub gastos: Vec<Gasto>,
    #[serde(default)]
    pub presupuestos: Vec<Presupuesto>,
    #[serde(default)]
    pub anuncios: Vec<Anuncio>,
    #[serde(default)]
    pub solicitudes: Vec<Solicitud>,
    #[serde(default)]
    pub cierres: Vec<Cierre>,
    #[serde(default)]
    pub fondos: Fondos,
    #[serde(default)]
    pub movimientos_fondos: Vec<MovimientoFondo>,
    #[serde(default)]
    pub parcialidades: Vec<Parcialidad>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_parcialidades: Option<MetaParcialidades>,
    #[serde(rename = "nextId", default)]
    pub next_id: NextId,
}
