use std::{env, fs};

use chrono::{Datelike, NaiveDate, Utc};

use crate::{
    models::{
        Anuncio, Cuota, Documento, EstadoCuota, EstadoPresupuesto, Fondos, Permiso, Presupuesto,
        Rol, TipoAnuncio, TipoCuota, Usuario,
    },
    password::hash_password,
};

use super::coleccion::create;

pub const SEED_ADMIN_EMAIL: &str = "admin@condominio.com";
pub const SEED_ADMIN_PASSWORD: &str = "admin123";
pub const SEED_TENANT_PASSWORD: &str = "inquilino123";
pub const SEED_CUOTA_MENSUAL: f64 = 550.0;

const SEED_TENANTS: [(&str, &str, &str); 5] = [
    ("María González", "maria.gonzalez@condominio.com", "101"),
    ("Carlos Ramírez", "carlos.ramirez@condominio.com", "102"),
    ("Ana Torres", "ana.torres@condominio.com", "201"),
    ("Luis Herrera", "luis.herrera@condominio.com", "202"),
    ("Sofía Méndez", "sofia.mendez@condominio.com", "301"),
];

/// Document written when no data file exists yet.
///
/// When `SEED_FILE` points to a readable JSON document it is used instead of
/// the built-in sample dataset.
pub(super) fn documento_inicial() -> Documento {
    if let Ok(path) = env::var("SEED_FILE") {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Documento>(&contents) {
                Ok(doc) => return doc,
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "SEED_FILE is not a valid document, using built-in seed")
                }
            },
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "SEED_FILE not readable, using built-in seed")
            }
        }
    }
    documento_de_ejemplo()
}

pub fn documento_de_ejemplo() -> Documento {
    let now = Utc::now();
    let today = now.date_naive();
    let mut doc = Documento::default();

    create(
        &mut doc,
        Usuario {
            id: 0,
            nombre: "Administrador".to_string(),
            email: SEED_ADMIN_EMAIL.to_string(),
            password: hash_password(SEED_ADMIN_PASSWORD),
            rol: Rol::Admin,
            departamento: None,
            telefono: None,
            permisos: Default::default(),
            activo: true,
            created_at: now,
            updated_at: None,
        },
    );

    create(
        &mut doc,
        Usuario {
            id: 0,
            nombre: "Comité de Administración".to_string(),
            email: "comite@condominio.com".to_string(),
            password: hash_password(SEED_TENANT_PASSWORD),
            rol: Rol::Comite,
            departamento: None,
            telefono: None,
            permisos: [
                (Permiso::Anuncios, true),
                (Permiso::Solicitudes, true),
                (Permiso::Gastos, false),
            ]
            .into_iter()
            .collect(),
            activo: true,
            created_at: now,
            updated_at: None,
        },
    );

    let vencimiento = NaiveDate::from_ymd_opt(today.year(), today.month(), 10).unwrap_or(today);
    for (nombre, email, depto) in SEED_TENANTS {
        let usuario = create(
            &mut doc,
            Usuario {
                id: 0,
                nombre: nombre.to_string(),
                email: email.to_string(),
                password: hash_password(SEED_TENANT_PASSWORD),
                rol: Rol::Inquilino,
                departamento: Some(depto.to_string()),
                telefono: None,
                permisos: Default::default(),
                activo: true,
                created_at: now,
                updated_at: None,
            },
        );

        create(
            &mut doc,
            Cuota {
                id: 0,
                usuario_id: Some(usuario.id),
                departamento: depto.to_string(),
                concepto: format!("Cuota de mantenimiento {:02}/{}", today.month(), today.year()),
                monto: SEED_CUOTA_MENSUAL,
                tipo_cuota: TipoCuota::Mensual,
                mes: Some(today.month()),
                anio: Some(today.year()),
                fecha_vencimiento: vencimiento,
                estado: EstadoCuota::Pendiente,
                fecha_pago: None,
                metodo_pago: None,
                monto_pagado: 0.0,
                created_at: now,
            },
        );
    }

    create(
        &mut doc,
        Presupuesto {
            id: 0,
            titulo: "Mantenimiento de áreas comunes".to_string(),
            descripcion: Some("Jardinería, limpieza y pintura".to_string()),
            monto: 60_000.0,
            monto_ejecutado: 0.0,
            categoria: "mantenimiento".to_string(),
            anio: today.year(),
            estado: EstadoPresupuesto::Aprobado,
            created_at: now,
            updated_at: None,
        },
    );

    create(
        &mut doc,
        Anuncio {
            id: 0,
            titulo: "Bienvenidos".to_string(),
            contenido: "Este es el nuevo portal de administración del condominio.".to_string(),
            tipo: TipoAnuncio::General,
            autor_id: 1,
            activo: true,
            archivos: Vec::new(),
            fecha_expiracion: None,
            created_at: now,
            updated_at: None,
        },
    );

    doc.fondos = Fondos {
        ahorro_acumulado: 50_000.0,
        gastos_mayores: 20_000.0,
        dinero_operacional: 10_000.0,
        patrimonio_total: 0.0,
    };
    doc.fondos.recalcular_patrimonio();

    doc
}
