use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use thiserror::Error;

use crate::{
    error::{AppError, AppResult},
    models::Documento,
};

use super::{salud, seed};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no se pudo leer {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archivo de datos corrupto {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no se pudo escribir {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no se pudo serializar el documento: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The whole document in memory, mirrored to one JSON file. Writes run on a
/// working copy and only become live after the file was replaced.
pub struct Store {
    path: PathBuf,
    data: RwLock<Documento>,
}

impl Store {
    /// Loads the data file. A missing file is replaced by the seed dataset;
    /// a file that does not parse is a fatal error and is left untouched.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let documento = parse_documento(&path, &contents)?;
                let informe = salud::revisar(&documento);
                if !informe.ok {
                    tracing::warn!(
                        path = %path.display(),
                        problemas = informe.problemas.len(),
                        "data file loaded with integrity problems"
                    );
                }
                tracing::info!(
                    path = %path.display(),
                    usuarios = documento.usuarios.len(),
                    cuotas = documento.cuotas.len(),
                    "data file loaded"
                );
                Ok(Store {
                    path,
                    data: RwLock::new(documento),
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "data file missing, writing seed dataset");
                Self::create(path, seed::documento_inicial())
            }
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    /// Builds a store around an explicit document and writes it out.
    pub fn create(path: impl Into<PathBuf>, documento: Documento) -> Result<Self, StoreError> {
        let path = path.into();
        persist(&path, &documento)?;
        Ok(Store {
            path,
            data: RwLock::new(documento),
        })
    }

    pub fn read<T>(&self, f: impl FnOnce(&Documento) -> T) -> T {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn snapshot(&self) -> Documento {
        self.read(Documento::clone)
    }

    /// Applies `f` to a working copy. Nothing is kept, in memory or on disk,
    /// unless `f` succeeds, the result introduces no new integrity problem,
    /// and the file was written.
    pub fn update<T>(&self, f: impl FnOnce(&mut Documento) -> AppResult<T>) -> AppResult<T> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut borrador = guard.clone();
        let resultado = f(&mut borrador)?;

        if let Some(problema) = salud::primer_problema_nuevo(&guard, &borrador) {
            return Err(AppError::Validation(problema.mensaje));
        }

        persist(&self.path, &borrador)?;
        *guard = borrador;
        Ok(resultado)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        persist(&self.path, &guard)
    }

    /// Swaps in a whole document (backup restore) and persists it.
    pub fn replace(&self, documento: Documento) -> Result<(), StoreError> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        persist(&self.path, &documento)?;
        *guard = documento;
        Ok(())
    }
}

pub(crate) fn parse_documento(path: &Path, contents: &str) -> Result<Documento, StoreError> {
    serde_json::from_str::<Documento>(contents).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn persist(path: &Path, documento: &Documento) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(documento)?;
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(write_err)?;
    file.write_all(json.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(write_err)?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "data file saved");
    Ok(())
}
