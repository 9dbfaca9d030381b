// config.rs
// Runtime configuration read from the environment (.env is loaded by main).

use std::{env, path::PathBuf};

pub const MAX_ARCHIVOS_POR_ANUNCIO: usize = 5;
pub const MAX_BYTES_POR_ARCHIVO: usize = 5 * 1024 * 1024; // 5 MB
pub const MIME_PERMITIDOS: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub data_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub audit_dir: PathBuf,
    pub session_ttl_seconds: u64,
    pub max_backups: usize,
    pub vencidas_interval_minutes: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            app_name: env_or("APP_NAME", "Condominio"),
            environment: env_or("APP_ENV", "production").to_lowercase(),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            data_file: PathBuf::from(env_or("DATA_FILE", "./data/data.json")),
            uploads_dir: PathBuf::from(env_or("UPLOADS_DIR", "./uploads")),
            backups_dir: PathBuf::from(env_or("BACKUPS_DIR", "./backups")),
            audit_dir: PathBuf::from(env_or("AUDIT_DIR", "./logs")),
            session_ttl_seconds: env_parse("SESSION_TTL_SECONDS", 60 * 60 * 8),
            max_backups: env_parse("MAX_BACKUPS", 10),
            vencidas_interval_minutes: env_parse("VENCIDAS_INTERVAL_MINUTES", 60),
        }
    }

    /// Configuration rooted in `base`, used by tests to keep every file in a temp dir.
    pub fn for_dir(base: &std::path::Path) -> Self {
        AppConfig {
            app_name: "Condominio".to_string(),
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            data_file: base.join("data.json"),
            uploads_dir: base.join("uploads"),
            backups_dir: base.join("backups"),
            audit_dir: base.join("logs"),
            session_ttl_seconds: 60 * 60,
            max_backups: 10,
            vencidas_interval_minutes: 60,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
