use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{
    Anuncio, Cierre, Cuota, Documento, EstadoCuota, Fondo, Gasto, MovimientoFondo, Parcialidad,
    Presupuesto, Rol, Solicitud, Usuario, redondear,
};

use super::coleccion::Registro;

const TOLERANCIA: f64 = 0.005;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problema {
    pub coleccion: String,
    pub id: Option<u64>,
    pub mensaje: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InformeSalud {
    pub ok: bool,
    pub problemas: Vec<Problema>,
}

/// `[1-5]0[1-4]`: floor 1..5, unit 01..04.
pub fn departamento_valido(valor: &str) -> bool {
    let bytes = valor.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && bytes[1] == b'0'
        && (b'1'..=b'4').contains(&bytes[2])
}

pub fn email_valido(valor: &str) -> bool {
    let Some((local, dominio)) = valor.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !dominio.starts_with('.')
        && !dominio.ends_with('.')
        && dominio.contains('.')
        && !valor.chars().any(char::is_whitespace)
}

pub fn revisar(doc: &Documento) -> InformeSalud {
    let mut problemas = Vec::new();

    revisar_usuarios(doc, &mut problemas);
    revisar_cuotas(doc, &mut problemas);
    revisar_fondos(doc, &mut problemas);

    for p in &doc.presupuestos {
        if p.monto < 0.0 || p.monto_ejecutado < 0.0 {
            problemas.push(problema("presupuestos", Some(p.id), format!(
                "Presupuesto {} con montos negativos",
                p.id
            )));
        }
    }
    for p in &doc.parcialidades {
        if p.monto <= 0.0 {
            problemas.push(problema("parcialidades", Some(p.id), format!(
                "Parcialidad {} con monto no positivo",
                p.id
            )));
        }
        if !departamento_valido(&p.departamento) {
            problemas.push(problema("parcialidades", Some(p.id), format!(
                "Parcialidad {} con departamento inválido: {}",
                p.id, p.departamento
            )));
        }
    }

    revisar_ids::<Usuario>(doc, &mut problemas);
    revisar_ids::<Cuota>(doc, &mut problemas);
    revisar_ids::<Gasto>(doc, &mut problemas);
    revisar_ids::<Presupuesto>(doc, &mut problemas);
    revisar_ids::<Anuncio>(doc, &mut problemas);
    revisar_ids::<Solicitud>(doc, &mut problemas);
    revisar_ids::<Cierre>(doc, &mut problemas);
    revisar_ids::<Parcialidad>(doc, &mut problemas);
    revisar_ids::<MovimientoFondo>(doc, &mut problemas);

    InformeSalud {
        ok: problemas.is_empty(),
        problemas,
    }
}

/// First problem present in `despues` that was not already present in `antes`.
pub fn primer_problema_nuevo(antes: &Documento, despues: &Documento) -> Option<Problema> {
    let previos = revisar(antes).problemas;
    revisar(despues)
        .problemas
        .into_iter()
        .find(|p| !previos.contains(p))
}

/// Fixes what can be derived mechanically: patrimonioTotal and nextId counters.
pub fn reparar(doc: &mut Documento) -> Vec<String> {
    let mut acciones = Vec::new();

    let calculado = doc.fondos.total_calculado();
    if (doc.fondos.patrimonio_total - calculado).abs() > TOLERANCIA {
        acciones.push(format!(
            "patrimonioTotal recalculado: {} -> {}",
            doc.fondos.patrimonio_total, calculado
        ));
        doc.fondos.recalcular_patrimonio();
    }

    acciones.extend(levantar_contador::<Usuario>(doc));
    acciones.extend(levantar_contador::<Cuota>(doc));
    acciones.extend(levantar_contador::<Gasto>(doc));
    acciones.extend(levantar_contador::<Presupuesto>(doc));
    acciones.extend(levantar_contador::<Anuncio>(doc));
    acciones.extend(levantar_contador::<Solicitud>(doc));
    acciones.extend(levantar_contador::<Cierre>(doc));
    acciones.extend(levantar_contador::<Parcialidad>(doc));
    acciones.extend(levantar_contador::<MovimientoFondo>(doc));

    acciones
}

fn problema(coleccion: &str, id: Option<u64>, mensaje: String) -> Problema {
    Problema {
        coleccion: coleccion.to_string(),
        id,
        mensaje,
    }
}

fn revisar_usuarios(doc: &Documento, problemas: &mut Vec<Problema>) {
    let mut emails: HashSet<String> = HashSet::new();
    let mut departamentos: HashMap<String, u64> = HashMap::new();

    for u in &doc.usuarios {
        if !email_valido(&u.email) {
            problemas.push(problema("usuarios", Some(u.id), format!(
                "Email inválido: {} (usuario {})",
                u.email, u.id
            )));
        }
        if !emails.insert(u.email.to_lowercase()) {
            problemas.push(problema("usuarios", Some(u.id), format!(
                "Email duplicado: {} (usuario {})",
                u.email, u.id
            )));
        }
        if u.rol != Rol::Inquilino {
            continue;
        }
        match u.departamento.as_deref() {
            None => problemas.push(problema("usuarios", Some(u.id), format!(
                "Inquilino {} sin departamento",
                u.id
            ))),
            Some(depto) if !departamento_valido(depto) => {
                problemas.push(problema("usuarios", Some(u.id), format!(
                    "Departamento inválido: {} (usuario {})",
                    depto, u.id
                )))
            }
            Some(depto) => {
                if let Some(otro) = departamentos.insert(depto.to_string(), u.id) {
                    problemas.push(problema("usuarios", Some(u.id), format!(
                        "Departamento {} duplicado entre inquilinos {} y {}",
                        depto, otro, u.id
                    )));
                }
            }
        }
    }
}

fn revisar_cuotas(doc: &Documento, problemas: &mut Vec<Problema>) {
    for c in &doc.cuotas {
        if c.monto <= 0.0 {
            problemas.push(problema("cuotas", Some(c.id), format!(
                "Cuota {} con monto no positivo",
                c.id
            )));
        }
        if c.monto_pagado < 0.0 || c.monto_pagado > c.monto + TOLERANCIA {
            problemas.push(problema("cuotas", Some(c.id), format!(
                "Cuota {}: monto_pagado {} fuera de rango (monto {})",
                c.id, c.monto_pagado, c.monto
            )));
        }
        if c.estado == EstadoCuota::Pagado && c.fecha_pago.is_none() {
            problemas.push(problema("cuotas", Some(c.id), format!(
                "Cuota {} pagada sin fecha_pago",
                c.id
            )));
        }
        if !departamento_valido(&c.departamento) {
            problemas.push(problema("cuotas", Some(c.id), format!(
                "Cuota {} con departamento inválido: {}",
                c.id, c.departamento
            )));
        }
    }
}

fn revisar_fondos(doc: &Documento, problemas: &mut Vec<Problema>) {
    let fondos = &doc.fondos;
    let calculado = fondos.total_calculado();
    if (redondear(fondos.patrimonio_total) - calculado).abs() > TOLERANCIA {
        problemas.push(problema("fondos", None, format!(
            "patrimonioTotal {} no coincide con la suma de fondos {}",
            fondos.patrimonio_total, calculado
        )));
    }
    for fondo in Fondo::TODOS {
        if fondos.saldo(fondo) < -TOLERANCIA {
            problemas.push(problema("fondos", None, format!(
                "Fondo {} con saldo negativo",
                fondo.as_str()
            )));
        }
    }
}

fn revisar_ids<T: Registro>(doc: &Documento, problemas: &mut Vec<Problema>) {
    let coleccion = T::COLECCION.nombre();
    let mut vistos = HashSet::new();
    let mut max_id = 0;
    for item in T::items(doc) {
        let id = item.id();
        if !vistos.insert(id) {
            problemas.push(problema(coleccion, Some(id), format!(
                "Id {} duplicado en {}",
                id, coleccion
            )));
        }
        max_id = max_id.max(id);
    }
    let contador = doc.next_id.valor(T::COLECCION);
    if contador <= max_id {
        problemas.push(problema(coleccion, None, format!(
            "nextId.{} ({}) no supera el id máximo {}",
            coleccion, contador, max_id
        )));
    }
}

fn levantar_contador<T: Registro>(doc: &mut Documento) -> Option<String> {
    let max_id = T::items(doc).iter().map(Registro::id).max().unwrap_or(0);
    let antes = doc.next_id.valor(T::COLECCION);
    doc.next_id.asegurar_mayor_que(T::COLECCION, max_id);
    let despues = doc.next_id.valor(T::COLECCION);
    (antes != despues).then(|| {
        format!(
            "nextId.{} ajustado: {} -> {}",
            T::COLECCION.nombre(),
            antes,
            despues
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departamento_format() {
        for ok in ["101", "104", "201", "304", "501", "504"] {
            assert!(departamento_valido(ok), "{ok} should be valid");
        }
        for bad in ["100", "105", "601", "011", "1010", "10", "1a1", "111"] {
            assert!(!departamento_valido(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn email_format() {
        assert!(email_valido("admin@condominio.com"));
        assert!(!email_valido("admin"));
        assert!(!email_valido("@condominio.com"));
        assert!(!email_valido("admin@localhost"));
        assert!(!email_valido("ad min@condominio.com"));
    }

    #[test]
    fn patrimonio_mismatch_is_reported_and_repaired() {
        let mut doc = Documento::default();
        doc.fondos.ahorro_acumulado = 100.0;
        doc.fondos.patrimonio_total = 50.0;
        assert!(!revisar(&doc).ok);

        let acciones = reparar(&mut doc);
        assert_eq!(acciones.len(), 1);
        assert_eq!(doc.fondos.patrimonio_total, 100.0);
        assert!(revisar(&doc).ok);
    }

    #[test]
    fn stale_counter_is_reported_and_lifted() {
        let mut doc = Documento::default();
        doc.solicitudes.push(Solicitud {
            id: 4,
            usuario_id: 1,
            departamento: None,
            titulo: "Fuga".into(),
            descripcion: "Fuga en el pasillo".into(),
            estado: crate::models::EstadoSolicitud::Pendiente,
            respuesta: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
        });
        let informe = revisar(&doc);
        assert!(informe.problemas.iter().any(|p| p.coleccion == "solicitudes"));

        reparar(&mut doc);
        assert_eq!(doc.next_id.solicitudes, 5);
        assert!(revisar(&doc).ok);
    }

    #[test]
    fn only_new_problems_block_writes() {
        let mut antes = Documento::default();
        antes.fondos.patrimonio_total = 10.0; // already inconsistent
        let mut despues = antes.clone();
        assert!(primer_problema_nuevo(&antes, &despues).is_none());

        despues.fondos.dinero_operacional = -5.0;
        let nuevo = primer_problema_nuevo(&antes, &despues);
        assert!(nuevo.is_some());
    }
}
