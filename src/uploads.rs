// uploads.rs
// Announcement attachments: multipart parsing, allow-listed MIME types, and
// sanitized unique file names under uploads/anuncios/.

use std::path::{Path, PathBuf};

use axum::{body::Bytes, extract::Multipart};
use chrono::NaiveDate;
use slug::slugify;
use uuid::Uuid;

use crate::{
    config::{MAX_ARCHIVOS_POR_ANUNCIO, MAX_BYTES_POR_ARCHIVO, MIME_PERMITIDOS},
    error::{AppError, AppResult},
    models::{ArchivoAdjunto, TipoAnuncio},
    schemas::AnuncioInput,
};

pub const SUBDIR_ANUNCIOS: &str = "anuncios";

/// A file received in a form, not yet written to disk.
pub struct ArchivoSubido {
    pub nombre_original: String,
    pub mime: String,
    pub datos: Bytes,
}

pub fn directorio_anuncios(uploads_dir: &Path) -> PathBuf {
    uploads_dir.join(SUBDIR_ANUNCIOS)
}

/// Slugified stem, a random suffix, and the lowercased extension.
pub fn nombre_seguro(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|s| slugify(s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "archivo".to_string());
    let stem: String = stem.chars().take(60).collect();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    let unico = Uuid::new_v4().simple().to_string();
    match ext {
        Some(ext) => format!("{stem}-{unico}.{ext}"),
        None => format!("{stem}-{unico}"),
    }
}

/// Stored names are generated by `nombre_seguro`; anything with a path component is refused.
pub fn ruta_archivo(uploads_dir: &Path, nombre_archivo: &str) -> AppResult<PathBuf> {
    if nombre_archivo.is_empty()
        || nombre_archivo.contains(['/', '\\'])
        || nombre_archivo.starts_with('.')
    {
        return Err(AppError::Validation("Nombre de archivo inválido".to_string()));
    }
    Ok(directorio_anuncios(uploads_dir).join(nombre_archivo))
}

pub fn validar_archivo(mime: &str, tamano: usize) -> AppResult<()> {
    if !MIME_PERMITIDOS.contains(&mime) {
        return Err(AppError::Validation(format!(
            "Tipo de archivo no permitido: {mime}"
        )));
    }
    if tamano > MAX_BYTES_POR_ARCHIVO {
        return Err(AppError::Validation(format!(
            "El archivo excede el máximo de {} MB",
            MAX_BYTES_POR_ARCHIVO / (1024 * 1024)
        )));
    }
    Ok(())
}

fn texto_a_bool(valor: &str) -> AppResult<bool> {
    match valor.trim().to_lowercase().as_str() {
        "true" | "1" | "si" | "sí" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        otro => Err(AppError::Validation(format!("Valor booleano inválido: {otro}"))),
    }
}

fn no_vacio(valor: String) -> Option<String> {
    let valor = valor.trim().to_string();
    (!valor.is_empty()).then_some(valor)
}

fn aplicar_campo(input: &mut AnuncioInput, nombre: &str, valor: String) -> AppResult<()> {
    match nombre {
        "titulo" => input.titulo = no_vacio(valor),
        "contenido" => input.contenido = no_vacio(valor),
        "tipo" => {
            if let Some(tipo) = no_vacio(valor) {
                let tipo: TipoAnuncio = serde_json::from_value(serde_json::Value::String(tipo.to_lowercase()))
                    .map_err(|_| AppError::Validation(format!("Tipo de anuncio inválido: {tipo}")))?;
                input.tipo = Some(tipo);
            }
        }
        "activo" => {
            if let Some(v) = no_vacio(valor) {
                input.activo = Some(texto_a_bool(&v)?);
            }
        }
        "fecha_expiracion" => {
            input.fecha_expiracion = match no_vacio(valor) {
                Some(v) => Some(NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| {
                    AppError::Validation(format!("Fecha de expiración inválida: {v}"))
                })?),
                None => None,
            }
        }
        "eliminar_archivos" => input.eliminar_archivos.extend(
            valor
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        ),
        _ => {}
    }
    Ok(())
}

/// Reads an announcement form. Fields with a file name are attachments, the rest
/// are announcement fields.
pub async fn leer_formulario_anuncio(
    mut multipart: Multipart,
) -> AppResult<(AnuncioInput, Vec<ArchivoSubido>)> {
    let mut input = AnuncioInput::default();
    let mut archivos = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Formulario inválido: {e}")))?
    {
        let nombre = field.name().unwrap_or_default().to_string();
        if let Some(original) = field.file_name().map(str::to_string) {
            if original.is_empty() {
                continue;
            }
            if archivos.len() >= MAX_ARCHIVOS_POR_ANUNCIO {
                return Err(AppError::Validation(format!(
                    "Máximo {MAX_ARCHIVOS_POR_ANUNCIO} archivos por anuncio"
                )));
            }
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_lowercase();
            let datos = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("No se pudo leer {original}: {e}")))?;
            validar_archivo(&mime, datos.len())?;
            archivos.push(ArchivoSubido {
                nombre_original: original,
                mime,
                datos,
            });
        } else {
            let valor = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Campo {nombre} inválido: {e}")))?;
            aplicar_campo(&mut input, &nombre, valor)?;
        }
    }
    Ok((input, archivos))
}

/// Writes the files under uploads/anuncios/. On failure the files already
/// written by this call are removed.
pub async fn guardar_archivos(
    uploads_dir: &Path,
    archivos: Vec<ArchivoSubido>,
) -> AppResult<Vec<ArchivoAdjunto>> {
    let dir = directorio_anuncios(uploads_dir);
    tokio::fs::create_dir_all(&dir).await?;

    let mut guardados: Vec<ArchivoAdjunto> = Vec::with_capacity(archivos.len());
    for archivo in archivos {
        let adjunto = ArchivoAdjunto {
            nombre_archivo: nombre_seguro(&archivo.nombre_original),
            nombre_original: archivo.nombre_original,
            mime: archivo.mime,
            tamano: archivo.datos.len() as u64,
        };
        if let Err(err) = tokio::fs::write(dir.join(&adjunto.nombre_archivo), &archivo.datos).await {
            eliminar_archivos(uploads_dir, &guardados).await;
            return Err(err.into());
        }
        guardados.push(adjunto);
    }
    Ok(guardados)
}

/// Best-effort removal; missing files are ignored.
pub async fn eliminar_archivos(uploads_dir: &Path, archivos: &[ArchivoAdjunto]) {
    for archivo in archivos {
        let Ok(path) = ruta_archivo(uploads_dir, &archivo.nombre_archivo) else {
            continue;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to remove attachment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_names_are_slugified_and_unique() {
        let a = nombre_seguro("Reglamento Interno 2026.PDF");
        let b = nombre_seguro("Reglamento Interno 2026.PDF");
        assert!(a.starts_with("reglamento-interno-2026-"));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
        assert!(!nombre_seguro("../../etc/passwd").contains('/'));
    }

    #[test]
    fn mime_and_size_limits() {
        assert!(validar_archivo("image/png", 10).is_ok());
        assert!(validar_archivo("application/x-msdownload", 10).is_err());
        assert!(validar_archivo("application/pdf", MAX_BYTES_POR_ARCHIVO + 1).is_err());
    }

    #[test]
    fn stored_names_cannot_escape() {
        let base = Path::new("/tmp/uploads");
        assert!(ruta_archivo(base, "../data.json").is_err());
        assert!(ruta_archivo(base, ".hidden").is_err());
        assert_eq!(
            ruta_archivo(base, "foto-1.png").unwrap(),
            base.join("anuncios").join("foto-1.png")
        );
    }

    #[test]
    fn form_fields_are_parsed() {
        let mut input = AnuncioInput::default();
        aplicar_campo(&mut input, "titulo", "  Corte de agua ".into()).unwrap();
        aplicar_campo(&mut input, "tipo", "URGENTE".into()).unwrap();
        aplicar_campo(&mut input, "activo", "0".into()).unwrap();
        aplicar_campo(&mut input, "fecha_expiracion", "2026-12-31".into()).unwrap();
        aplicar_campo(&mut input, "eliminar_archivos", "a.png, b.pdf".into()).unwrap();
        assert_eq!(input.titulo.as_deref(), Some("Corte de agua"));
        assert_eq!(input.tipo, Some(TipoAnuncio::Urgente));
        assert_eq!(input.activo, Some(false));
        assert_eq!(input.eliminar_archivos, vec!["a.png", "b.pdf"]);
        assert!(aplicar_campo(&mut input, "tipo", "otro".into()).is_err());
    }
}
