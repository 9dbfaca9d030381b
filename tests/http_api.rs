#[path = "common/mod.rs"]
mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::json;
use tower::ServiceExt; // for oneshot

use condominio::state::SEED_TENANT_PASSWORD;

use common::{COMITE_EMAIL, TENANT_101_EMAIL, TENANT_102_EMAIL, login, login_admin, send};

#[tokio::test]
async fn public_routes_need_no_token() {
    let ctx = common::setup_state();
    let app = ctx.app();

    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["status"], "ok");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("/api/auth/login"));
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_credentials() {
    let ctx = common::setup_state();
    let app = ctx.app();

    let (status, body) = send(&app, "GET", "/api/cuotas", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);

    let (status, _) = send(&app, "GET", "/api/cuotas", Some("no-es-un-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": TENANT_101_EMAIL, "password": "incorrecta" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Credenciales inválidas");

    let (status, _) = send(&app, "POST", "/api/auth/login", None, Some(json!({ "email": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login(&app, TENANT_101_EMAIL, SEED_TENANT_PASSWORD).await;

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["departamento"], "101");
    assert!(body["data"].get("password").is_none());

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenants_only_see_their_own_departamento() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login(&app, TENANT_101_EMAIL, SEED_TENANT_PASSWORD).await;

    let (status, body) = send(&app, "GET", "/api/cuotas?departamento=102", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let cuotas = body["data"].as_array().unwrap();
    assert_eq!(cuotas.len(), 1);
    assert_eq!(cuotas[0]["departamento"], "101");

    let (status, _) = send(&app, "GET", "/api/cuotas/2", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", "/api/usuarios", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", "/api/fondos", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        "POST",
        "/api/cuotas/1/pagar",
        Some(&token),
        Some(json!({ "metodo_pago": "efectivo" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["saldo_pendiente"], 550.0);
}

#[tokio::test]
async fn admin_pays_a_cuota_and_funds_follow() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login_admin(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/cuotas/1/pagar",
        Some(&token),
        Some(json!({ "metodo_pago": "transferencia" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["cuota"]["estado"], "PAGADO");
    assert_eq!(body["data"]["fondos"]["dineroOperacional"], 10_550.0);
    assert_eq!(body["data"]["fondos"]["patrimonioTotal"], 80_550.0);

    let (status, body) = send(
        &app,
        "POST",
        "/api/cuotas/1/pagar",
        Some(&token),
        Some(json!({ "metodo_pago": "transferencia" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["ok"], false);

    let (status, body) = send(&app, "GET", "/api/cuotas/resumen", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagadas"], 1);

    let (status, _) = send(
        &app,
        "POST",
        "/api/fondos/transferir",
        Some(&token),
        Some(json!({ "origen": "dineroOperacional", "destino": "ahorroAcumulado", "monto": 99_999.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_tenant_departamento_is_a_conflict() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login_admin(&app).await;

    let nuevo = |departamento: &str, email: &str| {
        json!({
            "nombre": "Pedro Salas",
            "email": email,
            "password": "secreto123",
            "rol": "INQUILINO",
            "departamento": departamento,
        })
    };

    let (status, body) = send(&app, "POST", "/api/usuarios", Some(&token), Some(nuevo("101", "pedro@condominio.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = send(&app, "POST", "/api/usuarios", Some(&token), Some(nuevo("404", "pedro@condominio.com"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["departamento"], "404");

    let (status, _) = send(&app, "POST", "/api/usuarios", Some(&token), Some(nuevo("403", "no-es-email"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comite_permissions_gate_writes() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login(&app, COMITE_EMAIL, SEED_TENANT_PASSWORD).await;

    let (status, _) = send(&app, "GET", "/api/gastos", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/gastos",
        Some(&token),
        Some(json!({
            "concepto": "Jardinería",
            "categoria": "mantenimiento",
            "monto": 100.0,
            "fecha": "2026-01-15",
            "origen_fondo": "dineroOperacional",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/anuncios",
        Some(&token),
        Some(json!({ "titulo": "Corte de agua", "contenido": "El martes de 9 a 12.", "tipo": "urgente" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["tipo"], "urgente");

    let (status, _) = send(&app, "GET", "/api/respaldos", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn solicitudes_flow_between_tenant_and_comite() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let maria = login(&app, TENANT_101_EMAIL, SEED_TENANT_PASSWORD).await;
    let carlos = login(&app, TENANT_102_EMAIL, SEED_TENANT_PASSWORD).await;
    let comite = login(&app, COMITE_EMAIL, SEED_TENANT_PASSWORD).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/solicitudes",
        Some(&maria),
        Some(json!({ "titulo": "Fuga", "descripcion": "Hay una fuga en el pasillo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["data"]["id"].as_u64().unwrap();

    let (_, body) = send(&app, "GET", "/api/solicitudes", Some(&carlos), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (status, _) = send(&app, "DELETE", &format!("/api/solicitudes/{id}"), Some(&carlos), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/solicitudes/{id}/responder"),
        Some(&comite),
        Some(json!({ "estado": "resuelta", "respuesta": "Reparada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["estado"], "resuelta");

    let (status, _) = send(&app, "DELETE", &format!("/api/solicitudes/{id}"), Some(&maria), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn announcement_attachments_round_trip_through_multipart() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login_admin(&app).await;

    let boundary = "XBOUNDARYX";
    let multipart = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"titulo\"\r\n\r\nAsamblea\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"contenido\"\r\n\r\nOrden del día adjunta\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"archivos\"; filename=\"orden del dia.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF-1.4 prueba\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/anuncios")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(multipart))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let anuncio = &body["data"];
    let archivo = &anuncio["archivos"][0];
    assert_eq!(archivo["nombre_original"], "orden del dia.pdf");
    let nombre = archivo["nombre_archivo"].as_str().unwrap();
    assert!(nombre.ends_with(".pdf") && !nombre.contains(' '));

    let uri = format!("/api/anuncios/{}/archivos/{nombre}", anuncio["id"]);
    let request = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.4 prueba");

    let (status, _) = send(&app, "DELETE", &format!("/api/anuncios/{}", anuncio["id"]), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ctx.dir.join("uploads").join("anuncios").join(nombre).exists());
}

#[tokio::test]
async fn backups_restore_previous_state_and_are_audited() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login_admin(&app).await;

    let (status, body) = send(&app, "POST", "/api/respaldos", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let nombre = body["data"]["nombre"].as_str().unwrap().to_string();

    send(
        &app,
        "POST",
        "/api/cuotas/1/pagar",
        Some(&token),
        Some(json!({ "metodo_pago": "efectivo" })),
    )
    .await;

    let (status, body) = send(&app, "POST", &format!("/api/respaldos/{nombre}/restaurar"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = send(&app, "GET", "/api/cuotas/1", Some(&token), None).await;
    assert_eq!(body["data"]["estado"], "PENDIENTE");

    let (_, body) = send(&app, "GET", "/api/respaldos", Some(&token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "POST", "/api/respaldos/..%2Fdata.json/restaurar", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/auditoria", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let acciones: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["accion"].as_str())
        .collect();
    assert!(acciones.contains(&"login"));
    assert!(acciones.contains(&"restore"));

    let (status, body) = send(&app, "GET", "/api/validacion", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ok"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_are_all_applied_and_audited() {
    let ctx = common::setup_state();
    let app = ctx.app();
    let token = login_admin(&app).await;

    let mut tareas = Vec::new();
    for id in 1..=5 {
        let app = app.clone();
        let token = token.clone();
        tareas.push(tokio::spawn(async move {
            send(
                &app,
                "POST",
                &format!("/api/cuotas/{id}/pagar"),
                Some(&token),
                Some(json!({ "metodo_pago": "efectivo" })),
            )
            .await
        }));
    }
    for tarea in tareas {
        let (status, body) = tarea.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, body) = send(&app, "GET", "/api/fondos", Some(&token), None).await;
    assert_eq!(body["data"]["dineroOperacional"], 10_000.0 + 5.0 * 550.0);

    let (status, body) = send(&app, "GET", "/api/auditoria", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let pagos = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["entidad"] == "cuotas" && e["accion"] == "update")
        .count();
    assert_eq!(pagos, 5);
}
