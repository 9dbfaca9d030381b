use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::AppResult, models::Usuario};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccionAuditoria {
    Create,
    Update,
    Delete,
    PermissionChange,
    Login,
    Restore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventoAuditoria {
    pub timestamp: DateTime<Utc>,
    pub accion: AccionAuditoria,
    pub entidad: String,
    #[serde(default)]
    pub entidad_id: Option<u64>,
    #[serde(default)]
    pub actor_id: Option<u64>,
    #[serde(default)]
    pub actor_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub despues: Option<Value>,
}

impl EventoAuditoria {
    pub fn new(accion: AccionAuditoria, entidad: &str) -> Self {
        EventoAuditoria {
            timestamp: Utc::now(),
            accion,
            entidad: entidad.to_string(),
            entidad_id: None,
            actor_id: None,
            actor_email: None,
            antes: None,
            despues: None,
        }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.entidad_id = Some(id);
        self
    }

    pub fn actor(mut self, usuario: &Usuario) -> Self {
        self.actor_id = Some(usuario.id);
        self.actor_email = Some(usuario.email.clone());
        self
    }

    pub fn antes<T: Serialize>(mut self, valor: &T) -> Self {
        self.antes = serde_json::to_value(valor).ok();
        self
    }

    pub fn despues<T: Serialize>(mut self, valor: &T) -> Self {
        self.despues = serde_json::to_value(valor).ok();
        self
    }
}

/// Append-only trail, one JSON object per line in `audit-YYYY-MM-DD.jsonl`.
pub struct AuditLog {
    dir: PathBuf,
    escritura: Mutex<()>,
}

impl AuditLog {
    pub fn new(dir: PathBuf) -> Self {
        AuditLog {
            dir,
            escritura: Mutex::new(()),
        }
    }

    fn archivo(&self, fecha: NaiveDate) -> PathBuf {
        self.dir.join(format!("audit-{}.jsonl", fecha.format("%Y-%m-%d")))
    }

    fn escribir(&self, evento: &EventoAuditoria) -> io::Result<()> {
        let mut linea = serde_json::to_string(evento)?;
        linea.push('\n');
        let _guard = self.escritura.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.archivo(evento.timestamp.date_naive()))?;
        file.write_all(linea.as_bytes())
    }

    /// Appends an event. Failures are logged and never fail the request.
    pub fn registrar(&self, evento: EventoAuditoria) {
        if let Err(err) = self.escribir(&evento) {
            tracing::error!(
                error = %err,
                accion = ?evento.accion,
                entidad = %evento.entidad,
                "failed to write audit event"
            );
        }
    }

    /// Events of one day, oldest first. A day without activity is empty.
    pub fn leer(&self, fecha: NaiveDate) -> AppResult<Vec<EventoAuditoria>> {
        let path = self.archivo(fecha);
        let contenido = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut eventos = Vec::new();
        for (n, linea) in contenido.lines().enumerate() {
            if linea.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventoAuditoria>(linea) {
                Ok(evento) => eventos.push(evento),
                Err(err) => {
                    tracing::warn!(path = %path.display(), linea = n + 1, error = %err, "skipping malformed audit line")
                }
            }
        }
        Ok(eventos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_appended_per_day() {
        let dir = std::env::temp_dir().join(format!("audit-test-{}", uuid::Uuid::new_v4()));
        let log = AuditLog::new(dir.clone());
        log.registrar(EventoAuditoria::new(AccionAuditoria::Create, "cuotas").id(4));
        log.registrar(EventoAuditoria::new(AccionAuditoria::Delete, "cuotas").id(4));

        let hoy = Utc::now().date_naive();
        let eventos = log.leer(hoy).unwrap();
        assert_eq!(eventos.len(), 2);
        assert_eq!(eventos[0].accion, AccionAuditoria::Create);
        assert_eq!(eventos[1].entidad_id, Some(4));

        let ayer = hoy.pred_opt().unwrap();
        assert!(log.leer(ayer).unwrap().is_empty());
        let _ = fs::remove_dir_all(dir);
    }
}
