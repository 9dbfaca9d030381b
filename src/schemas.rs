// schemas.rs
// Request bodies accepted by the API, validated with `validator` before they
// reach the state helpers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        EstadoPresupuesto, EstadoSolicitud, Fondo, Permiso, Rol, TipoAnuncio, TipoCierre, TipoCuota,
    },
};

pub fn validate_input<T: Validate>(input: &T) -> AppResult<()> {
    input.validate().map_err(Into::into)
}

/// Serializes an update body into a JSON patch, dropping absent fields.
pub fn to_patch<T: Serialize>(input: &T) -> AppResult<Map<String, Value>> {
    let value = serde_json::to_value(input)?;
    Ok(match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 200))]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CambiarPasswordInput {
    pub actual: String,
    #[validate(length(min = 6, max = 200))]
    pub nueva: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearUsuarioInput {
    #[validate(length(min = 1, max = 120))]
    pub nombre: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 200))]
    pub password: String,
    pub rol: Rol,
    #[serde(default)]
    pub departamento: Option<String>,
    #[serde(default)]
    #[validate(length(max = 30))]
    pub telefono: Option<String>,
    #[serde(default)]
    pub permisos: Option<BTreeMap<Permiso, bool>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ActualizarUsuarioInput {
    #[validate(length(min = 1, max = 120))]
    pub nombre: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 200))]
    pub password: Option<String>,
    pub rol: Option<Rol>,
    pub departamento: Option<String>,
    #[validate(length(max = 30))]
    pub telefono: Option<String>,
    pub activo: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermisosInput {
    pub permisos: BTreeMap<Permiso, bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearCuotaInput {
    #[serde(default)]
    pub usuario_id: Option<u64>,
    pub departamento: String,
    #[validate(length(min = 1, max = 200))]
    pub concepto: String,
    #[validate(range(min = 0.01))]
    pub monto: f64,
    #[serde(default)]
    pub tipo_cuota: Option<TipoCuota>,
    #[serde(default)]
    #[validate(range(min = 1, max = 12))]
    pub mes: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 2000, max = 2100))]
    pub anio: Option<i32>,
    pub fecha_vencimiento: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ActualizarCuotaInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub concepto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.01))]
    pub monto: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha_vencimiento: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerarCuotasInput {
    /// Without `mes` the twelve months of `anio` are generated.
    #[serde(default)]
    #[validate(range(min = 1, max = 12))]
    pub mes: Option<u32>,
    #[validate(range(min = 2000, max = 2100))]
    pub anio: i32,
    #[validate(range(min = 0.01))]
    pub monto: f64,
    #[serde(default)]
    #[validate(range(min = 1, max = 31))]
    pub dia_vencimiento: Option<u32>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub concepto: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PagoCuotaInput {
    #[validate(length(min = 1, max = 50))]
    pub metodo_pago: String,
    /// Installment for `fondo_mayor` cuotas; defaults to the pending balance.
    #[serde(default)]
    #[validate(range(min = 0.01))]
    pub monto: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearGastoInput {
    #[validate(length(min = 1, max = 200))]
    pub concepto: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub descripcion: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub categoria: String,
    #[validate(range(min = 0.01))]
    pub monto: f64,
    pub fecha: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub proveedor: Option<String>,
    pub origen_fondo: Fondo,
    #[serde(default)]
    pub presupuesto_id: Option<u64>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub comprobante: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ActualizarGastoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub concepto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.01))]
    pub monto: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub proveedor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub comprobante: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearPresupuestoInput {
    #[validate(length(min = 1, max = 200))]
    pub titulo: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub descripcion: Option<String>,
    #[validate(range(min = 0.0))]
    pub monto: f64,
    #[validate(length(min = 1, max = 60))]
    pub categoria: String,
    #[validate(range(min = 2000, max = 2100))]
    pub anio: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ActualizarPresupuestoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub monto: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 60))]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 2000, max = 2100))]
    pub anio: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstadoPresupuestoInput {
    pub estado: EstadoPresupuesto,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EjecucionInput {
    #[validate(range(min = 0.01))]
    pub monto: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearSolicitudInput {
    #[validate(length(min = 1, max = 200))]
    pub titulo: String,
    #[validate(length(min = 1, max = 5000))]
    pub descripcion: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResponderSolicitudInput {
    pub estado: EstadoSolicitud,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub respuesta: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CierreInput {
    pub tipo: TipoCierre,
    #[validate(range(min = 2000, max = 2100))]
    pub anio: i32,
    #[serde(default)]
    #[validate(range(min = 1, max = 12))]
    pub mes: Option<u32>,
    /// Annual closures only: move what is left in dineroOperacional to ahorroAcumulado.
    #[serde(default)]
    pub transferir_saldo: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferenciaInput {
    pub origen: String,
    pub destino: String,
    #[validate(range(min = 0.01))]
    pub monto: f64,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub concepto: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AjusteFondoInput {
    pub fondo: String,
    #[validate(range(min = 0.0))]
    pub saldo: f64,
    #[validate(length(min = 1, max = 200))]
    pub motivo: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CrearParcialidadInput {
    /// Tenants always register for their own departamento.
    #[serde(default)]
    pub departamento: Option<String>,
    #[serde(default)]
    #[validate(range(min = 2000, max = 2100))]
    pub anio: Option<i32>,
    #[validate(range(min = 0.01))]
    pub monto: f64,
    #[serde(default)]
    pub fecha_pago: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub metodo_pago: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub comprobante: Option<String>,
    #[serde(default)]
    pub cuota_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RechazoInput {
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub observaciones: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MetaParcialidadesInput {
    #[validate(range(min = 2000, max = 2100))]
    pub anio: i32,
    #[validate(range(min = 0.01))]
    pub monto_por_departamento: f64,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub descripcion: Option<String>,
}

/// Announcement fields, collected from multipart form fields or a JSON body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AnuncioInput {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub titulo: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 10000))]
    pub contenido: Option<String>,
    #[serde(default)]
    pub tipo: Option<TipoAnuncio>,
    #[serde(default)]
    pub activo: Option<bool>,
    #[serde(default)]
    pub fecha_expiracion: Option<NaiveDate>,
    /// Stored file names to drop from the announcement on update.
    #[serde(default)]
    pub eliminar_archivos: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_drops_absent_fields() {
        let input = ActualizarCuotaInput {
            concepto: Some("Agua".into()),
            monto: None,
            fecha_vencimiento: None,
        };
        let patch = to_patch(&input).unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["concepto"], "Agua");
    }

    #[test]
    fn invalid_email_is_a_validation_error() {
        let input = CrearUsuarioInput {
            nombre: "Ana".into(),
            email: "no-es-email".into(),
            password: "secreto1".into(),
            rol: Rol::Inquilino,
            departamento: Some("101".into()),
            telefono: None,
            permisos: None,
        };
        let err = validate_input(&input).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));
    }
}
