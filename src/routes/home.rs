// routes/home.rs
// GET / -> landing page with a login form that talks to the JSON API.

use std::sync::Arc;

use askama::Template;
use axum::{extract::State, http::StatusCode, response::Html};

use crate::state::AppState;

#[derive(Template)]
#[template(path = "index.html")]
struct HomeTemplate<'a> {
    app_name: &'a str,
    version: &'a str,
}

pub async fn home(State(state): State<Arc<AppState>>) -> Result<Html<String>, StatusCode> {
    HomeTemplate {
        app_name: &state.config.app_name,
        version: env!("CARGO_PKG_VERSION"),
    }
    .render()
    .map(Html)
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
