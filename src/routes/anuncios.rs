// routes/anuncios.rs
// /api/anuncios: announcements with up to five attachments each.
//
// Create and update accept either multipart/form-data (fields plus files) or a
// plain JSON body without files.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{
        HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, AppResult},
    models::Permiso,
    schemas::{AnuncioInput, validate_input},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, actualizar_anuncio, archivo_de_anuncio, crear_anuncio,
        eliminar_anuncio, listar_anuncios, obtener_anuncio,
    },
    uploads::{
        ArchivoSubido, eliminar_archivos, guardar_archivos, leer_formulario_anuncio, ruta_archivo,
    },
};

use super::helpers::{ApiResult, JsonInput, en_disco, evento, hoy, ok, ok_msg};

async fn leer_anuncio(req: Request) -> AppResult<(AnuncioInput, Vec<ArchivoSubido>)> {
    let es_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (input, archivos) = if es_multipart {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AppError::Validation(format!("Formulario inválido: {}", e.body_text())))?;
        leer_formulario_anuncio(multipart).await?
    } else {
        let JsonInput(input) = JsonInput::<AnuncioInput>::from_request(req, &()).await?;
        (input, Vec::new())
    };
    validate_input(&input)?;
    Ok((input, archivos))
}

pub async fn anuncios_index(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    let vigentes_en = if session.es_gestor() { None } else { Some(hoy()) };
    ok(listar_anuncios(&state, vigentes_en))
}

pub async fn anuncios_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    let anuncio = obtener_anuncio(&state, id)?;
    if !session.es_gestor() && !anuncio.vigente(hoy()) {
        return Err(AppError::no_encontrado("Anuncio", id));
    }
    ok(anuncio)
}

pub async fn anuncios_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    req: Request,
) -> ApiResult {
    session.requerir_permiso(Permiso::Anuncios)?;
    let (input, subidos) = leer_anuncio(req).await?;
    let uploads_dir = state.config.uploads_dir.clone();
    let archivos = guardar_archivos(&uploads_dir, subidos).await?;

    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Create, "anuncios");
    let guardados = archivos.clone();
    let resultado = en_disco(&state, move |state| {
        let anuncio = crear_anuncio(state, &input, guardados, actor)?;
        state.auditoria.registrar(auditoria.id(anuncio.id).despues(&anuncio));
        Ok(anuncio)
    })
    .await;
    let anuncio = match resultado {
        Ok(anuncio) => anuncio,
        Err(err) => {
            eliminar_archivos(&uploads_dir, &archivos).await;
            return Err(err);
        }
    };
    ok_msg("Anuncio publicado", anuncio)
}

pub async fn anuncios_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    req: Request,
) -> ApiResult {
    session.requerir_permiso(Permiso::Anuncios)?;
    let antes = obtener_anuncio(&state, id)?;
    let (input, subidos) = leer_anuncio(req).await?;
    let uploads_dir = state.config.uploads_dir.clone();
    let nuevos = guardar_archivos(&uploads_dir, subidos).await?;

    let auditoria = evento(&session, AccionAuditoria::Update, "anuncios").id(id).antes(&antes);
    let guardados = nuevos.clone();
    let resultado = en_disco(&state, move |state| {
        let (anuncio, quitados) = actualizar_anuncio(state, id, &input, guardados)?;
        state.auditoria.registrar(auditoria.despues(&anuncio));
        Ok((anuncio, quitados))
    })
    .await;
    let (anuncio, quitados) = match resultado {
        Ok(resultado) => resultado,
        Err(err) => {
            eliminar_archivos(&uploads_dir, &nuevos).await;
            return Err(err);
        }
    };
    eliminar_archivos(&uploads_dir, &quitados).await;
    ok_msg("Anuncio actualizado", anuncio)
}

pub async fn anuncios_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Anuncios)?;
    let auditoria = evento(&session, AccionAuditoria::Delete, "anuncios").id(id);
    let anuncio = en_disco(&state, move |state| {
        let anuncio = eliminar_anuncio(state, id)?;
        state.auditoria.registrar(auditoria.antes(&anuncio));
        Ok(anuncio)
    })
    .await?;
    eliminar_archivos(&state.config.uploads_dir, &anuncio.archivos).await;
    ok_msg("Anuncio eliminado", anuncio)
}

pub async fn anuncios_archivo(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path((id, nombre)): Path<(u64, String)>,
) -> AppResult<Response> {
    let (anuncio, archivo) = archivo_de_anuncio(&state, id, &nombre)?;
    if !session.es_gestor() && !anuncio.vigente(hoy()) {
        return Err(AppError::no_encontrado("Anuncio", id));
    }

    let path = ruta_archivo(&state.config.uploads_dir, &archivo.nombre_archivo)?;
    let datos = match tokio::fs::read(&path).await {
        Ok(datos) => datos,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Archivo {nombre} no encontrado")));
        }
        Err(err) => return Err(err.into()),
    };

    let mut response = datos.into_response();
    let headers = response.headers_mut();
    if let Ok(mime) = HeaderValue::from_str(&archivo.mime) {
        headers.insert(CONTENT_TYPE, mime);
    }
    let original = archivo.nombre_original.replace('"', "");
    if let Ok(disposition) = HeaderValue::from_str(&format!("inline; filename=\"{original}\"")) {
        headers.insert(CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}
