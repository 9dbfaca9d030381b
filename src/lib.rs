// lib.rs
// Condominium administration service: JSON document store plus REST API.

pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod routes;
pub mod scheduler;
pub mod schemas;
pub mod session;
pub mod state;
pub mod uploads;
