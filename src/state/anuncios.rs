use chrono::{NaiveDate, Utc};

use crate::{
    config::MAX_ARCHIVOS_POR_ANUNCIO,
    error::{AppError, AppResult},
    models::{Anuncio, ArchivoAdjunto},
    schemas::AnuncioInput,
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove},
};

fn texto_requerido(valor: &Option<String>, campo: &str) -> AppResult<String> {
    valor
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("El campo {campo} es obligatorio")))
}

fn validar_cantidad(total: usize) -> AppResult<()> {
    if total > MAX_ARCHIVOS_POR_ANUNCIO {
        return Err(AppError::Validation(format!(
            "Máximo {MAX_ARCHIVOS_POR_ANUNCIO} archivos por anuncio"
        )));
    }
    Ok(())
}

/// Announcements newest first. With `vigentes_en`, only active and unexpired ones.
pub fn listar_anuncios(state: &AppState, vigentes_en: Option<NaiveDate>) -> Vec<Anuncio> {
    state.store.read(|doc| {
        let mut items: Vec<Anuncio> = doc
            .anuncios
            .iter()
            .filter(|a| vigentes_en.is_none_or(|hoy| a.vigente(hoy)))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    })
}

pub fn obtener_anuncio(state: &AppState, id: u64) -> AppResult<Anuncio> {
    state.store.read(|doc| buscar::<Anuncio>(doc, id).cloned())
}

pub fn crear_anuncio(
    state: &AppState,
    input: &AnuncioInput,
    archivos: Vec<ArchivoAdjunto>,
    autor_id: u64,
) -> AppResult<Anuncio> {
    let titulo = texto_requerido(&input.titulo, "titulo")?;
    let contenido = texto_requerido(&input.contenido, "contenido")?;
    validar_cantidad(archivos.len())?;

    state.store.update(|doc| {
        Ok(create(
            doc,
            Anuncio {
                id: 0,
                titulo: titulo.clone(),
                contenido: contenido.clone(),
                tipo: input.tipo.unwrap_or_default(),
                autor_id,
                activo: input.activo.unwrap_or(true),
                archivos: archivos.clone(),
                fecha_expiracion: input.fecha_expiracion,
                created_at: Utc::now(),
                updated_at: None,
            },
        ))
    })
}

/// Applies field changes, drops the listed attachments and appends the new ones.
/// Returns the updated announcement and the attachments that were dropped, so
/// their files can be removed from disk.
pub fn actualizar_anuncio(
    state: &AppState,
    id: u64,
    input: &AnuncioInput,
    nuevos: Vec<ArchivoAdjunto>,
) -> AppResult<(Anuncio, Vec<ArchivoAdjunto>)> {
    state.store.update(|doc| {
        let anuncio = buscar_mut::<Anuncio>(doc, id)?;
        if input.titulo.is_some() {
            anuncio.titulo = texto_requerido(&input.titulo, "titulo")?;
        }
        if input.contenido.is_some() {
            anuncio.contenido = texto_requerido(&input.contenido, "contenido")?;
        }
        if let Some(tipo) = input.tipo {
            anuncio.tipo = tipo;
        }
        if let Some(activo) = input.activo {
            anuncio.activo = activo;
        }
        if input.fecha_expiracion.is_some() {
            anuncio.fecha_expiracion = input.fecha_expiracion;
        }

        let (quitados, conservados): (Vec<ArchivoAdjunto>, Vec<ArchivoAdjunto>) = anuncio
            .archivos
            .drain(..)
            .partition(|a| input.eliminar_archivos.contains(&a.nombre_archivo));
        anuncio.archivos = conservados;
        anuncio.archivos.extend(nuevos.iter().cloned());
        validar_cantidad(anuncio.archivos.len())?;

        anuncio.updated_at = Some(Utc::now());
        Ok((anuncio.clone(), quitados))
    })
}

pub fn eliminar_anuncio(state: &AppState, id: u64) -> AppResult<Anuncio> {
    state.store.update(|doc| remove::<Anuncio>(doc, id))
}

/// Attachment metadata, looked up by its stored file name.
pub fn archivo_de_anuncio(
    state: &AppState,
    id: u64,
    nombre_archivo: &str,
) -> AppResult<(Anuncio, ArchivoAdjunto)> {
    let anuncio = obtener_anuncio(state, id)?;
    let archivo = anuncio
        .archivos
        .iter()
        .find(|a| a.nombre_archivo == nombre_archivo)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Archivo {nombre_archivo} no encontrado")))?;
    Ok((anuncio, archivo))
}
