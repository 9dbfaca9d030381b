use std::collections::BTreeMap;

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{Documento, Permiso, Rol, Usuario, UsuarioPublico},
    password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    schemas::{ActualizarUsuarioInput, CrearUsuarioInput},
};

use super::{
    AppState,
    coleccion::{buscar, buscar_mut, create, remove},
    salud::{departamento_valido, email_valido},
};

fn normalizar_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validar_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

/// Checks email format/uniqueness and the tenant departamento rule for `candidato`
/// against every other user in the document.
fn validar_usuario(doc: &Documento, candidato: &Usuario) -> AppResult<()> {
    if candidato.nombre.trim().is_empty() {
        return Err(AppError::Validation("El nombre es obligatorio".to_string()));
    }
    if !email_valido(&candidato.email) {
        return Err(AppError::Validation(format!(
            "Email inválido: {}",
            candidato.email
        )));
    }
    let otros = doc.usuarios.iter().filter(|u| u.id != candidato.id);
    for otro in otros {
        if otro.email.eq_ignore_ascii_case(&candidato.email) {
            return Err(AppError::Conflict(format!(
                "Ya existe un usuario con el email {}",
                candidato.email
            )));
        }
        if candidato.rol == Rol::Inquilino
            && otro.rol == Rol::Inquilino
            && otro.departamento.is_some()
            && otro.departamento == candidato.departamento
        {
            return Err(AppError::Conflict(format!(
                "El departamento {} ya tiene un inquilino registrado",
                candidato.departamento.as_deref().unwrap_or_default()
            )));
        }
    }
    if candidato.rol == Rol::Inquilino {
        match candidato.departamento.as_deref() {
            None => {
                return Err(AppError::Validation(
                    "Los inquilinos requieren departamento".to_string(),
                ));
            }
            Some(depto) if !departamento_valido(depto) => {
                return Err(AppError::Validation(format!(
                    "Departamento inválido: {depto} (formato 101-504)"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn admins_activos(doc: &Documento) -> usize {
    doc.usuarios
        .iter()
        .filter(|u| u.rol == Rol::Admin && u.activo)
        .count()
}

fn es_ultimo_admin(doc: &Documento, usuario: &Usuario) -> bool {
    usuario.rol == Rol::Admin && usuario.activo && admins_activos(doc) <= 1
}

pub fn listar_usuarios(state: &AppState, rol: Option<Rol>) -> Vec<UsuarioPublico> {
    state.store.read(|doc| {
        doc.usuarios
            .iter()
            .filter(|u| rol.is_none_or(|r| u.rol == r))
            .map(Usuario::publico)
            .collect()
    })
}

pub fn obtener_usuario(state: &AppState, id: u64) -> AppResult<UsuarioPublico> {
    state
        .store
        .read(|doc| buscar::<Usuario>(doc, id).map(Usuario::publico))
}

/// The user behind a session, only while it exists and is active.
pub fn usuario_activo(state: &AppState, id: u64) -> Option<Usuario> {
    state.store.read(|doc| {
        doc.usuarios
            .iter()
            .find(|u| u.id == id && u.activo)
            .cloned()
    })
}

pub fn crear_usuario(state: &AppState, input: &CrearUsuarioInput) -> AppResult<UsuarioPublico> {
    validar_password(&input.password)?;
    let permisos = match (input.rol, &input.permisos) {
        (Rol::Comite, Some(permisos)) => permisos.clone(),
        _ => BTreeMap::new(),
    };
    let nuevo = Usuario {
        id: 0,
        nombre: input.nombre.trim().to_string(),
        email: normalizar_email(&input.email),
        password: hash_password(&input.password),
        rol: input.rol,
        departamento: input
            .departamento
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        telefono: input.telefono.clone(),
        permisos,
        activo: true,
        created_at: Utc::now(),
        updated_at: None,
    };

    state.store.update(|doc| {
        validar_usuario(doc, &nuevo)?;
        Ok(create(doc, nuevo.clone()).publico())
    })
}

pub fn actualizar_usuario(
    state: &AppState,
    id: u64,
    input: &ActualizarUsuarioInput,
) -> AppResult<UsuarioPublico> {
    if let Some(password) = &input.password {
        validar_password(password)?;
    }
    state.store.update(|doc| {
        let mut usuario = buscar::<Usuario>(doc, id)?.clone();
        let era_ultimo_admin = es_ultimo_admin(doc, &usuario);

        if let Some(nombre) = &input.nombre {
            usuario.nombre = nombre.trim().to_string();
        }
        if let Some(email) = &input.email {
            usuario.email = normalizar_email(email);
        }
        if let Some(password) = &input.password {
            usuario.password = hash_password(password);
        }
        if let Some(rol) = input.rol {
            usuario.rol = rol;
            if rol != Rol::Comite {
                usuario.permisos.clear();
            }
        }
        if let Some(depto) = &input.departamento {
            let depto = depto.trim();
            usuario.departamento = (!depto.is_empty()).then(|| depto.to_string());
        }
        if let Some(telefono) = &input.telefono {
            usuario.telefono = Some(telefono.trim().to_string()).filter(|t| !t.is_empty());
        }
        if let Some(activo) = input.activo {
            usuario.activo = activo;
        }

        if era_ultimo_admin && (usuario.rol != Rol::Admin || !usuario.activo) {
            return Err(AppError::Conflict(
                "No se puede degradar ni desactivar al último administrador".to_string(),
            ));
        }
        validar_usuario(doc, &usuario)?;
        usuario.updated_at = Some(Utc::now());

        let actual = buscar_mut::<Usuario>(doc, id)?;
        *actual = usuario;
        Ok(actual.publico())
    })
}

pub fn eliminar_usuario(state: &AppState, id: u64, actor_id: u64) -> AppResult<UsuarioPublico> {
    if id == actor_id {
        return Err(AppError::Conflict(
            "No puedes eliminar tu propio usuario".to_string(),
        ));
    }
    state.store.update(|doc| {
        let usuario = buscar::<Usuario>(doc, id)?;
        if es_ultimo_admin(doc, usuario) {
            return Err(AppError::Conflict(
                "No se puede eliminar al último administrador".to_string(),
            ));
        }
        remove::<Usuario>(doc, id).map(|u| u.publico())
    })
}

/// Checks credentials; the same message is returned for unknown email and wrong password.
pub fn autenticar(state: &AppState, email: &str, password: &str) -> AppResult<Usuario> {
    let email = normalizar_email(email);
    let usuario = state
        .store
        .read(|doc| doc.usuarios.iter().find(|u| u.email == email).cloned());
    let Some(usuario) = usuario else {
        return Err(AppError::Unauthorized("Credenciales inválidas".to_string()));
    };
    if !verify_password(password, &usuario.password) {
        return Err(AppError::Unauthorized("Credenciales inválidas".to_string()));
    }
    if !usuario.activo {
        return Err(AppError::Forbidden("Usuario inactivo".to_string()));
    }
    Ok(usuario)
}

pub fn cambiar_password(state: &AppState, id: u64, actual: &str, nueva: &str) -> AppResult<()> {
    validar_password(nueva)?;
    state.store.update(|doc| {
        let usuario = buscar_mut::<Usuario>(doc, id)?;
        if !verify_password(actual, &usuario.password) {
            return Err(AppError::Validation(
                "La contraseña actual es incorrecta".to_string(),
            ));
        }
        usuario.password = hash_password(nueva);
        usuario.updated_at = Some(Utc::now());
        Ok(())
    })
}

/// Replaces the permission map of a COMITE member. Unlisted areas are denied.
pub fn asignar_permisos(
    state: &AppState,
    id: u64,
    permisos: &BTreeMap<Permiso, bool>,
) -> AppResult<UsuarioPublico> {
    state.store.update(|doc| {
        let usuario = buscar_mut::<Usuario>(doc, id)?;
        if usuario.rol != Rol::Comite {
            return Err(AppError::Validation(
                "Solo los miembros del comité tienen permisos configurables".to_string(),
            ));
        }
        usuario.permisos = Permiso::TODOS
            .into_iter()
            .map(|p| (p, permisos.get(&p).copied().unwrap_or(false)))
            .collect();
        usuario.updated_at = Some(Utc::now());
        Ok(usuario.publico())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usuario(id: u64, email: &str, rol: Rol, depto: Option<&str>) -> Usuario {
        Usuario {
            id,
            nombre: "Prueba".into(),
            email: email.into(),
            password: String::new(),
            rol,
            departamento: depto.map(str::to_string),
            telefono: None,
            permisos: Default::default(),
            activo: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn duplicate_tenant_departamento_is_a_conflict() {
        let mut doc = Documento::default();
        doc.usuarios.push(usuario(1, "a@test.com", Rol::Inquilino, Some("101")));
        let err = validar_usuario(&doc, &usuario(2, "b@test.com", Rol::Inquilino, Some("101")))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // Non-tenants may share a departamento.
        assert!(validar_usuario(&doc, &usuario(2, "b@test.com", Rol::Comite, Some("101"))).is_ok());
    }

    #[test]
    fn tenant_departamento_format_is_checked() {
        let doc = Documento::default();
        for depto in ["105", "601", "011", "1010"] {
            assert!(
                validar_usuario(&doc, &usuario(1, "a@test.com", Rol::Inquilino, Some(depto)))
                    .is_err(),
                "{depto} debería ser inválido"
            );
        }
        assert!(validar_usuario(&doc, &usuario(1, "a@test.com", Rol::Inquilino, None)).is_err());
    }

    #[test]
    fn email_uniqueness_ignores_case() {
        let mut doc = Documento::default();
        doc.usuarios.push(usuario(1, "ana@test.com", Rol::Admin, None));
        let err = validar_usuario(&doc, &usuario(2, "ANA@test.com", Rol::Comite, None)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn last_admin_detection() {
        let mut doc = Documento::default();
        doc.usuarios.push(usuario(1, "a@test.com", Rol::Admin, None));
        assert!(es_ultimo_admin(&doc, &doc.usuarios[0]));
        doc.usuarios.push(usuario(2, "b@test.com", Rol::Admin, None));
        assert!(!es_ultimo_admin(&doc, &doc.usuarios[0]));
    }
}
