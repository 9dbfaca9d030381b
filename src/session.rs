// session.rs
// Session middleware to protect routes and extractor to access session data.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, AppResult},
    models::{Permiso, Rol, Usuario},
    state::{AppState, usuario_activo},
};

pub const SESSION_COOKIE_NAME: &str = "session";
pub const TOKEN_HEADER: &str = "x-auth-token";

#[derive(Clone)]
pub struct SessionData {
    pub usuario: Usuario,
    pub token: String,
}

/// Resolves the request token to a live session of an active user.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(token) = extract_token(request.headers()) else {
        return Err(unauthorized_response("Token de sesión requerido"));
    };

    let usuario = state
        .sesiones
        .resolver(&token)
        .and_then(|id| usuario_activo(&state, id));

    match usuario {
        Some(usuario) => {
            request
                .extensions_mut()
                .insert(SessionData { usuario, token });
            Ok(next.run(request).await)
        }
        None => Err(unauthorized_response("Sesión inválida o expirada")),
    }
}

pub struct SessionUser(pub SessionData);

impl SessionUser {
    pub fn usuario(&self) -> &Usuario {
        &self.0.usuario
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }

    pub fn id(&self) -> u64 {
        self.0.usuario.id
    }

    pub fn rol(&self) -> Rol {
        self.0.usuario.rol
    }

    pub fn departamento(&self) -> Option<&str> {
        self.0.usuario.departamento.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.rol().is_admin()
    }

    /// ADMIN and COMITE read every collection.
    pub fn es_gestor(&self) -> bool {
        matches!(self.rol(), Rol::Admin | Rol::Comite)
    }

    pub fn puede(&self, permiso: Permiso) -> bool {
        self.0.usuario.tiene_permiso(permiso)
    }

    pub fn requerir_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Solo los administradores pueden realizar esta acción".to_string(),
            ))
        }
    }

    pub fn requerir_gestor(&self) -> AppResult<()> {
        if self.es_gestor() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Acceso restringido".to_string()))
        }
    }

    pub fn requerir_permiso(&self, permiso: Permiso) -> AppResult<()> {
        if self.puede(permiso) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Sin permiso de escritura sobre {}",
                permiso.as_str()
            )))
        }
    }
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .map(SessionUser)
            .ok_or_else(|| unauthorized_response("Token de sesión requerido"))
    }
}

fn unauthorized_response(msg: &str) -> Response {
    AppError::Unauthorized(msg.to_string()).into_response()
}

/// Bearer header first, then `x-auth-token`, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(|t| t.trim().to_string());
    let header = || {
        headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|t| t.trim().to_string())
    };
    bearer
        .or_else(header)
        .or_else(|| extract_cookies(headers, SESSION_COOKIE_NAME).into_iter().next())
        .filter(|t| !t.is_empty())
}

fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            if key == name {
                Some(value.to_owned())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn token_sources_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("otra=1; session=COOKIE"));
        assert_eq!(extract_token(&headers).as_deref(), Some("COOKIE"));

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("HEADER"));
        assert_eq!(extract_token(&headers).as_deref(), Some("HEADER"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer ABC"));
        assert_eq!(extract_token(&headers).as_deref(), Some("ABC"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
