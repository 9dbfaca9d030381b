#![allow(dead_code)]

use std::{fs, path::PathBuf, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for oneshot

use condominio::{
    config::AppConfig,
    routes::build_router,
    state::{AppState, SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD, Store, build_state, documento_de_ejemplo},
};

pub const TENANT_101_EMAIL: &str = "maria.gonzalez@condominio.com";
pub const TENANT_102_EMAIL: &str = "carlos.ramirez@condominio.com";
pub const COMITE_EMAIL: &str = "comite@condominio.com";

/// Isolated state rooted in its own temp directory, removed on drop.
pub struct TestContext {
    pub state: Arc<AppState>,
    pub dir: PathBuf,
}

impl TestContext {
    pub fn app(&self) -> Router {
        build_router(self.state.clone())
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("condominio-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// State seeded with the sample dataset (admin, comite, five tenants with one
/// pending 550 cuota each, one budget, one announcement).
pub fn setup_state() -> TestContext {
    let dir = temp_dir();
    let config = AppConfig::for_dir(&dir);
    let store = Store::create(&config.data_file, documento_de_ejemplo()).expect("create store");
    TestContext {
        state: Arc::new(build_state(config, store)),
        dir,
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed for {email}: {body}");
    body["data"]["token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

pub async fn login_admin(app: &Router) -> String {
    login(app, SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD).await
}
