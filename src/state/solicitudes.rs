use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{EstadoSolicitud, Solicitud, Usuario},
    schemas::{CrearSolicitudInput, ResponderSolicitudInput},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroSolicitudes {
    pub estado: Option<EstadoSolicitud>,
    pub usuario_id: Option<u64>,
    pub departamento: Option<String>,
}

pub fn listar_solicitudes(state: &AppState, filtro: &FiltroSolicitudes) -> Vec<Solicitud> {
    state.store.read(|doc| {
        let mut items: Vec<Solicitud> = doc
            .solicitudes
            .iter()
            .filter(|s| {
                filtro.estado.is_none_or(|e| s.estado == e)
                    && filtro.usuario_id.is_none_or(|u| s.usuario_id == u)
                    && filtro
                        .departamento
                        .as_deref()
                        .is_none_or(|d| s.departamento.as_deref() == Some(d))
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    })
}

pub fn obtener_solicitud(state: &AppState, id: u64) -> AppResult<Solicitud> {
    state.store.read(|doc| buscar::<Solicitud>(doc, id).cloned())
}

pub fn crear_solicitud(
    state: &AppState,
    input: &CrearSolicitudInput,
    autor: &Usuario,
) -> AppResult<Solicitud> {
    let titulo = input.titulo.trim();
    let descripcion = input.descripcion.trim();
    if titulo.is_empty() || descripcion.is_empty() {
        return Err(AppError::Validation(
            "Título y descripción son obligatorios".to_string(),
        ));
    }
    state.store.update(|doc| {
        Ok(create(
            doc,
            Solicitud {
                id: 0,
                usuario_id: autor.id,
                departamento: autor.departamento.clone(),
                titulo: titulo.to_string(),
                descripcion: descripcion.to_string(),
                estado: EstadoSolicitud::Pendiente,
                respuesta: None,
                created_at: Utc::now(),
                updated_at: None,
            },
        ))
    })
}

pub fn responder_solicitud(
    state: &AppState,
    id: u64,
    input: &ResponderSolicitudInput,
) -> AppResult<Solicitud> {
    state.store.update(|doc| {
        let solicitud = buscar_mut::<Solicitud>(doc, id)?;
        solicitud.estado = input.estado;
        if let Some(respuesta) = input.respuesta.as_deref().map(str::trim) {
            solicitud.respuesta = Some(respuesta.to_string()).filter(|r| !r.is_empty());
        }
        solicitud.updated_at = Some(Utc::now());
        Ok(solicitud.clone())
    })
}

/// Owners may withdraw their own requests while still pending; managers may delete any.
pub fn eliminar_solicitud(state: &AppState, id: u64, actor: &Usuario, gestiona: bool) -> AppResult<Solicitud> {
    state.store.update(|doc| {
        let solicitud = buscar::<Solicitud>(doc, id)?;
        if !gestiona {
            if solicitud.usuario_id != actor.id {
                return Err(AppError::Forbidden(
                    "Solo puedes eliminar tus propias solicitudes".to_string(),
                ));
            }
            if solicitud.estado != EstadoSolicitud::Pendiente {
                return Err(AppError::Conflict(
                    "Solo se pueden eliminar solicitudes pendientes".to_string(),
                ));
            }
        }
        remove::<Solicitud>(doc, id)
    })
}
