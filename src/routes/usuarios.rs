// routes/usuarios.rs
// /api/usuarios CRUD and /api/permisos for COMITE members.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{Permiso, Rol},
    schemas::{ActualizarUsuarioInput, CrearUsuarioInput, PermisosInput},
    session::SessionUser,
    state::{
        AccionAuditoria, AppState, asignar_permisos, crear_usuario, eliminar_usuario,
        listar_usuarios, obtener_usuario, actualizar_usuario,
    },
};

use super::helpers::{ApiResult, JsonInput, Validated, en_disco, evento, ok, ok_msg};

#[derive(Deserialize)]
pub struct UsuariosQuery {
    rol: Option<String>,
}

pub async fn usuarios_index(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsuariosQuery>,
) -> ApiResult {
    session.requerir_gestor()?;
    let rol = match query.rol.as_deref().filter(|r| !r.is_empty()) {
        Some(r) => Some(Rol::parse(r).ok_or_else(|| AppError::Validation(format!("Rol inválido: {r}")))?),
        None => None,
    };
    ok(listar_usuarios(&state, rol))
}

pub async fn usuarios_show(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    if id != session.id() {
        session.requerir_gestor()?;
    }
    ok(obtener_usuario(&state, id)?)
}

pub async fn usuarios_create(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Validated(body): Validated<CrearUsuarioInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Usuarios)?;
    if body.rol == Rol::Admin {
        session.requerir_admin()?;
    }
    let auditoria = evento(&session, AccionAuditoria::Create, "usuarios");
    let usuario = en_disco(&state, move |state| {
        let usuario = crear_usuario(state, &body)?;
        state.auditoria.registrar(auditoria.id(usuario.id).despues(&usuario));
        Ok(usuario)
    })
    .await?;
    ok_msg("Usuario creado", usuario)
}

pub async fn usuarios_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Validated(body): Validated<ActualizarUsuarioInput>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Usuarios)?;
    let antes = obtener_usuario(&state, id)?;
    if antes.rol == Rol::Admin || body.rol == Some(Rol::Admin) {
        session.requerir_admin()?;
    }
    let cambia_password = body.password.is_some();
    let auditoria = evento(&session, AccionAuditoria::Update, "usuarios").id(id).antes(&antes);
    let despues = en_disco(&state, move |state| {
        let despues = actualizar_usuario(state, id, &body)?;
        state.auditoria.registrar(auditoria.despues(&despues));
        Ok(despues)
    })
    .await?;
    if !despues.activo || cambia_password {
        state.sesiones.eliminar_de_usuario(id);
    }
    ok_msg("Usuario actualizado", despues)
}

pub async fn usuarios_delete(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult {
    session.requerir_permiso(Permiso::Usuarios)?;
    if obtener_usuario(&state, id)?.rol == Rol::Admin {
        session.requerir_admin()?;
    }
    let actor = session.id();
    let auditoria = evento(&session, AccionAuditoria::Delete, "usuarios").id(id);
    let eliminado = en_disco(&state, move |state| {
        let eliminado = eliminar_usuario(state, id, actor)?;
        state.auditoria.registrar(auditoria.antes(&eliminado));
        Ok(eliminado)
    })
    .await?;
    state.sesiones.eliminar_de_usuario(id);
    ok_msg("Usuario eliminado", eliminado)
}

pub async fn permisos_index(session: SessionUser, State(state): State<Arc<AppState>>) -> ApiResult {
    session.requerir_admin()?;
    let comite = listar_usuarios(&state, Some(Rol::Comite));
    let disponibles: Vec<&str> = Permiso::TODOS.iter().map(Permiso::as_str).collect();
    ok(json!({ "disponibles": disponibles, "comite": comite }))
}

pub async fn permisos_update(
    session: SessionUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    JsonInput(body): JsonInput<PermisosInput>,
) -> ApiResult {
    session.requerir_admin()?;
    let antes = obtener_usuario(&state, id)?;
    let auditoria = evento(&session, AccionAuditoria::PermissionChange, "usuarios")
        .id(id)
        .antes(&antes.permisos);
    let despues = en_disco(&state, move |state| {
        let despues = asignar_permisos(state, id, &body.permisos)?;
        state.auditoria.registrar(auditoria.despues(&despues.permisos));
        Ok(despues)
    })
    .await?;
    ok_msg("Permisos actualizados", despues)
}
