use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    error::{AppError, AppResult},
    models::{
        Anuncio, Cierre, Coleccion, Cuota, Documento, Gasto, MovimientoFondo, Parcialidad,
        Presupuesto, Solicitud, Usuario,
    },
};

/// An entity stored in one of the document's arrays.
pub trait Registro: Clone + Serialize + DeserializeOwned {
    const COLECCION: Coleccion;
    const ENTIDAD: &'static str;

    fn id(&self) -> u64;
    fn asignar_id(&mut self, id: u64);
    fn items(doc: &Documento) -> &Vec<Self>;
    fn items_mut(doc: &mut Documento) -> &mut Vec<Self>;
}

macro_rules! registro {
    ($tipo:ty, $coleccion:expr, $entidad:literal, $campo:ident) => {
        impl Registro for $tipo {
            const COLECCION: Coleccion = $coleccion;
            const ENTIDAD: &'static str = $entidad;

            fn id(&self) -> u64 {
                self.id
            }

            fn asignar_id(&mut self, id: u64) {
                self.id = id;
            }

            fn items(doc: &Documento) -> &Vec<Self> {
                &doc.$campo
            }

            fn items_mut(doc: &mut Documento) -> &mut Vec<Self> {
                &mut doc.$campo
            }
        }
    };
}

registro!(Usuario, Coleccion::Usuarios, "Usuario", usuarios);
registro!(Cuota, Coleccion::Cuotas, "Cuota", cuotas);
registro!(Gasto, Coleccion::Gastos, "Gasto", gastos);
registro!(Presupuesto, Coleccion::Presupuestos, "Presupuesto", presupuestos);
registro!(Anuncio, Coleccion::Anuncios, "Anuncio", anuncios);
registro!(Solicitud, Coleccion::Solicitudes, "Solicitud", solicitudes);
registro!(Cierre, Coleccion::Cierres, "Cierre", cierres);
registro!(Parcialidad, Coleccion::Parcialidades, "Parcialidad", parcialidades);
registro!(
    MovimientoFondo,
    Coleccion::MovimientosFondos,
    "Movimiento",
    movimientos_fondos
);

pub fn get_all<T: Registro>(doc: &Documento) -> &[T] {
    T::items(doc)
}

pub fn get_by_id<T: Registro>(doc: &Documento, id: u64) -> Option<&T> {
    T::items(doc).iter().find(|item| item.id() == id)
}

/// Like `get_by_id`, failing with NotFound.
pub fn buscar<T: Registro>(doc: &Documento, id: u64) -> AppResult<&T> {
    get_by_id(doc, id).ok_or_else(|| AppError::no_encontrado(T::ENTIDAD, id))
}

pub fn buscar_mut<T: Registro>(doc: &mut Documento, id: u64) -> AppResult<&mut T> {
    T::items_mut(doc)
        .iter_mut()
        .find(|item| item.id() == id)
        .ok_or_else(|| AppError::no_encontrado(T::ENTIDAD, id))
}

/// Appends `item` with the next id of its collection and returns the stored copy.
pub fn create<T: Registro>(doc: &mut Documento, mut item: T) -> T {
    let id = doc.next_id.siguiente(T::COLECCION);
    item.asignar_id(id);
    T::items_mut(doc).push(item.clone());
    item
}

/// Merges `cambios` into the entity's fields. The id never changes and the
/// merged value must still match the typed schema.
pub fn update<T: Registro>(doc: &mut Documento, id: u64, cambios: &Map<String, Value>) -> AppResult<T> {
    let actual = buscar_mut::<T>(doc, id)?;
    let mut valor = serde_json::to_value(&*actual)?;
    let objeto = valor
        .as_object_mut()
        .ok_or_else(|| AppError::Internal(format!("{} no serializa como objeto", T::ENTIDAD)))?;
    for (campo, nuevo) in cambios {
        if campo == "id" {
            continue;
        }
        objeto.insert(campo.clone(), nuevo.clone());
    }
    let actualizado: T = serde_json::from_value(valor)
        .map_err(|e| AppError::Validation(format!("{}: campos inválidos ({e})", T::ENTIDAD)))?;
    *actual = actualizado.clone();
    Ok(actualizado)
}

pub fn remove<T: Registro>(doc: &mut Documento, id: u64) -> AppResult<T> {
    let items = T::items_mut(doc);
    let pos = items
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| AppError::no_encontrado(T::ENTIDAD, id))?;
    Ok(items.remove(pos))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    use super::*;
    use crate::models::{EstadoCuota, TipoCuota};

    fn cuota(depto: &str) -> Cuota {
        Cuota {
            id: 0,
            usuario_id: None,
            departamento: depto.to_string(),
            concepto: "Mantenimiento".to_string(),
            monto: 550.0,
            tipo_cuota: TipoCuota::Mensual,
            mes: Some(1),
            anio: Some(2026),
            fecha_vencimiento: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            estado: EstadoCuota::Pendiente,
            fecha_pago: None,
            metodo_pago: None,
            monto_pagado: 0.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_takes_id_from_counter() {
        let mut doc = Documento::default();
        doc.next_id.cuotas = 7;
        let a = create(&mut doc, cuota("101"));
        let b = create(&mut doc, cuota("102"));
        assert_eq!(a.id, 7);
        assert_eq!(b.id, 8);
        assert_eq!(doc.next_id.cuotas, 9);
        assert_eq!(get_all::<Cuota>(&doc).len(), 2);
    }

    #[test]
    fn update_merges_fields_and_keeps_id() {
        let mut doc = Documento::default();
        let c = create(&mut doc, cuota("101"));
        let cambios = json!({ "id": 99, "concepto": "Agua", "monto": 600.0 });
        let actualizada =
            update::<Cuota>(&mut doc, c.id, cambios.as_object().unwrap()).unwrap();
        assert_eq!(actualizada.id, c.id);
        assert_eq!(actualizada.concepto, "Agua");
        assert_eq!(actualizada.departamento, "101");
        assert_eq!(get_by_id::<Cuota>(&doc, c.id).unwrap().monto, 600.0);
    }

    #[test]
    fn update_rejects_values_outside_schema() {
        let mut doc = Documento::default();
        let c = create(&mut doc, cuota("101"));
        let cambios = json!({ "estado": "PERDIDO" });
        let err = update::<Cuota>(&mut doc, c.id, cambios.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            get_by_id::<Cuota>(&doc, c.id).unwrap().estado,
            EstadoCuota::Pendiente
        );
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut doc = Documento::default();
        let c = create(&mut doc, cuota("101"));
        assert_eq!(remove::<Cuota>(&mut doc, c.id).unwrap().id, c.id);
        assert!(matches!(
            remove::<Cuota>(&mut doc, c.id),
            Err(AppError::NotFound(_))
        ));
    }
}
