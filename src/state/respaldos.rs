use std::{fs, io, path::Path};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};

use super::{AppState, salud, store::parse_documento};

// backups/data-YYYYMMDD-HHMMSS[-n].json, rotated to the newest `max_backups`.
const PREFIJO: &str = "data-";
const EXTENSION: &str = ".json";

#[derive(Debug, Clone, Serialize)]
pub struct Respaldo {
    pub nombre: String,
    pub tamano: u64,
    pub creado: DateTime<Utc>,
}

/// `data-YYYYMMDD-HHMMSS[-n].json`, nothing that could leave the backups dir.
pub fn nombre_respaldo_valido(nombre: &str) -> bool {
    let Some(cuerpo) = nombre
        .strip_prefix(PREFIJO)
        .and_then(|n| n.strip_suffix(EXTENSION))
    else {
        return false;
    };
    cuerpo.len() >= 15
        && cuerpo
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-')
        && cuerpo.as_bytes()[8] == b'-'
}

/// Orders backups by timestamp, then by the same-second suffix (none sorts first).
fn clave_orden(nombre: &str) -> (&str, u32) {
    let cuerpo = nombre
        .strip_prefix(PREFIJO)
        .and_then(|n| n.strip_suffix(EXTENSION))
        .unwrap_or(nombre);
    let (marca, sufijo) = cuerpo.split_at(cuerpo.len().min(15));
    let n = sufijo
        .strip_prefix('-')
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);
    (marca, n)
}

fn leer_respaldo(path: &Path) -> io::Result<Respaldo> {
    let meta = fs::metadata(path)?;
    Ok(Respaldo {
        nombre: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        tamano: meta.len(),
        creado: meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
    })
}

/// Backups newest first.
pub fn listar_respaldos(state: &AppState) -> AppResult<Vec<Respaldo>> {
    let dir = &state.config.backups_dir;
    let entradas = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut respaldos = Vec::new();
    for entrada in entradas {
        let entrada = entrada?;
        let nombre = entrada.file_name().to_string_lossy().into_owned();
        if nombre_respaldo_valido(&nombre) {
            respaldos.push(leer_respaldo(&entrada.path())?);
        }
    }
    respaldos.sort_by(|a, b| clave_orden(&b.nombre).cmp(&clave_orden(&a.nombre)));
    Ok(respaldos)
}

fn rotar(state: &AppState) -> AppResult<()> {
    let respaldos = listar_respaldos(state)?;
    for viejo in respaldos.iter().skip(state.config.max_backups.max(1)) {
        fs::remove_file(state.config.backups_dir.join(&viejo.nombre))?;
        tracing::info!(nombre = %viejo.nombre, "old backup removed");
    }
    Ok(())
}

/// Writes the current document to a new backup file and rotates old ones.
pub fn crear_respaldo(state: &AppState) -> AppResult<Respaldo> {
    let dir = &state.config.backups_dir;
    fs::create_dir_all(dir)?;
    let contenido = serde_json::to_string_pretty(&state.store.snapshot())?;

    let base = format!("{PREFIJO}{}", Utc::now().format("%Y%m%d-%H%M%S"));
    let mut path = dir.join(format!("{base}{EXTENSION}"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{base}-{n}{EXTENSION}"));
        n += 1;
    }
    fs::write(&path, contenido)?;
    let respaldo = leer_respaldo(&path)?;
    tracing::info!(nombre = %respaldo.nombre, bytes = respaldo.tamano, "backup created");

    rotar(state)?;
    Ok(respaldo)
}

/// Replaces the live document with a backup. The backup must parse; the current
/// state is backed up first so the restore itself can be undone.
pub fn restaurar_respaldo(state: &AppState, nombre: &str) -> AppResult<Respaldo> {
    if !nombre_respaldo_valido(nombre) {
        return Err(AppError::Validation(format!(
            "Nombre de respaldo inválido: {nombre}"
        )));
    }
    let path = state.config.backups_dir.join(nombre);
    let contenido = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Respaldo {nombre} no encontrado")));
        }
        Err(err) => return Err(err.into()),
    };
    let documento = parse_documento(&path, &contenido)
        .map_err(|e| AppError::Validation(format!("El respaldo no es válido: {e}")))?;

    let informe = salud::revisar(&documento);
    if !informe.ok {
        tracing::warn!(nombre, problemas = informe.problemas.len(), "restoring backup with integrity problems");
    }

    let restaurado = leer_respaldo(&path)?;
    let previo = crear_respaldo(state)?;
    state.store.replace(documento)?;
    tracing::info!(nombre, previo = %previo.nombre, "backup restored");
    Ok(restaurado)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_names_are_checked() {
        assert!(nombre_respaldo_valido("data-20260105-101500.json"));
        assert!(nombre_respaldo_valido("data-20260105-101500-2.json"));
        assert!(!nombre_respaldo_valido("../data-20260105-101500.json"));
        assert!(!nombre_respaldo_valido("data-2026.json"));
        assert!(!nombre_respaldo_valido("data-20260105-10150/.json"));
        assert!(!nombre_respaldo_valido("otro-20260105-101500.json"));
    }

    #[test]
    fn same_second_backups_order_by_suffix() {
        let mut nombres = vec![
            "data-20260105-101500-10.json",
            "data-20260105-101500.json",
            "data-20260105-101500-2.json",
            "data-20260104-235959-1.json",
            "data-20260105-101500-1.json",
        ];
        nombres.sort_by(|a, b| clave_orden(b).cmp(&clave_orden(a)));
        assert_eq!(
            nombres,
            [
                "data-20260105-101500-10.json",
                "data-20260105-101500-2.json",
                "data-20260105-101500-1.json",
                "data-20260105-101500.json",
                "data-20260104-235959-1.json",
            ]
        );
    }
}
