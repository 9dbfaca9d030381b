#[path = "common/mod.rs"]
mod common;

use std::fs;

use chrono::Utc;
use serde_json::{Map, json};

use condominio::{
    error::AppError,
    models::{Cuota, Documento, EstadoCuota, Fondo, TipoCuota, Usuario},
    state::{
        Store, StoreError, coleccion::{create, get_all, get_by_id, remove, update},
        documento_de_ejemplo, salud,
    },
};

fn cuota(departamento: &str) -> Cuota {
    Cuota {
        id: 0,
        usuario_id: None,
        departamento: departamento.to_string(),
        concepto: "Cuota de prueba".to_string(),
        monto: 100.0,
        tipo_cuota: TipoCuota::Mensual,
        mes: Some(1),
        anio: Some(2026),
        fecha_vencimiento: chrono::NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
        estado: EstadoCuota::Pendiente,
        fecha_pago: None,
        metodo_pago: None,
        monto_pagado: 0.0,
        created_at: Utc::now(),
    }
}

#[test]
fn ids_are_sequential_and_never_reused() {
    let mut doc = Documento::default();
    let a = create(&mut doc, cuota("101"));
    let b = create(&mut doc, cuota("102"));
    assert_eq!((a.id, b.id), (1, 2));

    remove::<Cuota>(&mut doc, b.id).unwrap();
    let c = create(&mut doc, cuota("103"));
    assert_eq!(c.id, 3);
    assert_eq!(get_all::<Cuota>(&doc).len(), 2);
    assert!(get_by_id::<Cuota>(&doc, 2).is_none());
}

#[test]
fn merge_update_keeps_id_and_rejects_bad_types() {
    let mut doc = Documento::default();
    let creada = create(&mut doc, cuota("101"));

    let mut cambios = Map::new();
    cambios.insert("concepto".into(), json!("Nuevo concepto"));
    cambios.insert("id".into(), json!(99));
    let actualizada: Cuota = update(&mut doc, creada.id, &cambios).unwrap();
    assert_eq!(actualizada.id, creada.id);
    assert_eq!(actualizada.concepto, "Nuevo concepto");

    let mut malos = Map::new();
    malos.insert("monto".into(), json!("mucho"));
    assert!(matches!(
        update::<Cuota>(&mut doc, creada.id, &malos),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        update::<Cuota>(&mut doc, 42, &cambios),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn persisted_document_reloads_identically() {
    let dir = common::temp_dir();
    let path = dir.join("data.json");
    let store = Store::create(&path, documento_de_ejemplo()).unwrap();
    store
        .update(|doc| {
            create(doc, cuota("401"));
            Ok(())
        })
        .unwrap();

    let reloaded = Store::load(&path).unwrap();
    let antes = serde_json::to_value(store.snapshot()).unwrap();
    let despues = serde_json::to_value(reloaded.snapshot()).unwrap();
    assert_eq!(antes, despues);
    assert!(!path.with_extension("json.tmp").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn save_rewrites_a_deleted_file() {
    let dir = common::temp_dir();
    let path = dir.join("data.json");
    let store = Store::create(&path, documento_de_ejemplo()).unwrap();
    fs::remove_file(&path).unwrap();

    store.save().unwrap();
    let reloaded = Store::load(&path).unwrap();
    assert_eq!(
        reloaded.read(|doc| doc.usuarios.len()),
        store.read(|doc| doc.usuarios.len())
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_file_is_seeded_and_corrupt_file_is_fatal() {
    let dir = common::temp_dir();

    let nuevo = dir.join("nuevo.json");
    let store = Store::load(&nuevo).unwrap();
    assert!(nuevo.exists());
    assert!(store.read(|doc| !doc.usuarios.is_empty()));

    let corrupto = dir.join("corrupto.json");
    fs::write(&corrupto, "{ esto no es json").unwrap();
    assert!(matches!(Store::load(&corrupto), Err(StoreError::Corrupt { .. })));
    assert_eq!(fs::read_to_string(&corrupto).unwrap(), "{ esto no es json");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn failed_update_leaves_memory_and_disk_untouched() {
    let dir = common::temp_dir();
    let path = dir.join("data.json");
    let store = Store::create(&path, documento_de_ejemplo()).unwrap();
    let en_disco = fs::read_to_string(&path).unwrap();
    let cuotas = store.read(|doc| doc.cuotas.len());

    let resultado: Result<(), AppError> = store.update(|doc| {
        create(doc, cuota("101"));
        Err(AppError::Conflict("abortado".into()))
    });
    assert!(resultado.is_err());
    assert_eq!(store.read(|doc| doc.cuotas.len()), cuotas);
    assert_eq!(fs::read_to_string(&path).unwrap(), en_disco);

    // Breaking the patrimonio invariant is refused by the store itself.
    let resultado: Result<(), AppError> = store.update(|doc| {
        doc.fondos.ahorro_acumulado += 1000.0;
        Ok(())
    });
    assert!(matches!(resultado, Err(AppError::Validation(_))));
    assert_eq!(fs::read_to_string(&path).unwrap(), en_disco);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn seed_document_is_healthy() {
    let doc = documento_de_ejemplo();
    let informe = salud::revisar(&doc);
    assert!(informe.ok, "{:?}", informe.problemas);
    assert_eq!(
        doc.fondos.patrimonio_total,
        doc.fondos.saldo(Fondo::AhorroAcumulado)
            + doc.fondos.saldo(Fondo::GastosMayores)
            + doc.fondos.saldo(Fondo::DineroOperacional)
    );
    let inquilinos: Vec<&Usuario> = doc
        .usuarios
        .iter()
        .filter(|u| u.departamento.is_some())
        .collect();
    assert_eq!(inquilinos.len(), doc.cuotas.len());
}

#[test]
fn repair_recomputes_patrimonio_and_counters() {
    let mut doc = documento_de_ejemplo();
    doc.fondos.patrimonio_total = 1.0;
    doc.next_id.cuotas = 1;

    assert!(!salud::revisar(&doc).ok);
    let acciones = salud::reparar(&mut doc);
    assert!(acciones.len() >= 2);
    assert!(salud::revisar(&doc).ok);
    assert_eq!(doc.fondos.patrimonio_total, doc.fondos.total_calculado());
    assert_eq!(doc.next_id.cuotas, doc.cuotas.len() as u64 + 1);
}
