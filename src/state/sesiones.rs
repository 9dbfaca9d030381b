use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Duration, Utc};

use crate::password::generate_token;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Sesion {
    pub token: String,
    pub usuario_id: u64,
    pub expira: DateTime<Utc>,
}

/// Bearer-token sessions, kept in memory only (a restart logs everyone out).
pub struct Sesiones {
    ttl: Duration,
    tabla: RwLock<HashMap<String, Sesion>>,
}

impl Sesiones {
    pub fn new(ttl_seconds: u64) -> Self {
        Sesiones {
            ttl: Duration::seconds(ttl_seconds.min(i64::MAX as u64) as i64),
            tabla: RwLock::new(HashMap::new()),
        }
    }

    /// Issues a new token for the user, dropping any previous session of theirs.
    pub fn crear(&self, usuario_id: u64) -> Sesion {
        let sesion = Sesion {
            token: generate_token(TOKEN_BYTES),
            usuario_id,
            expira: Utc::now() + self.ttl,
        };
        let mut tabla = self.tabla.write().unwrap_or_else(PoisonError::into_inner);
        tabla.retain(|_, s| s.usuario_id != usuario_id);
        tabla.insert(sesion.token.clone(), sesion.clone());
        sesion
    }

    /// Returns the user id behind a live token; expired tokens are removed.
    pub fn resolver(&self, token: &str) -> Option<u64> {
        let encontrada = {
            let tabla = self.tabla.read().unwrap_or_else(PoisonError::into_inner);
            tabla.get(token).cloned()
        }?;
        if encontrada.expira <= Utc::now() {
            self.eliminar(token);
            return None;
        }
        Some(encontrada.usuario_id)
    }

    pub fn eliminar(&self, token: &str) {
        let mut tabla = self.tabla.write().unwrap_or_else(PoisonError::into_inner);
        tabla.remove(token);
    }

    pub fn eliminar_de_usuario(&self, usuario_id: u64) {
        let mut tabla = self.tabla.write().unwrap_or_else(PoisonError::into_inner);
        tabla.retain(|_, s| s.usuario_id != usuario_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_resolves_until_removed() {
        let sesiones = Sesiones::new(60);
        let s = sesiones.crear(3);
        assert_eq!(sesiones.resolver(&s.token), Some(3));
        sesiones.eliminar(&s.token);
        assert_eq!(sesiones.resolver(&s.token), None);
    }

    #[test]
    fn new_login_replaces_previous_session() {
        let sesiones = Sesiones::new(60);
        let primera = sesiones.crear(3);
        let segunda = sesiones.crear(3);
        assert_eq!(sesiones.resolver(&primera.token), None);
        assert_eq!(sesiones.resolver(&segunda.token), Some(3));
    }

    #[test]
    fn expired_tokens_do_not_resolve() {
        let sesiones = Sesiones::new(0);
        let s = sesiones.crear(1);
        assert_eq!(sesiones.resolver(&s.token), None);
    }
}
