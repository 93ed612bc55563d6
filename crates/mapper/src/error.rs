use std::path::PathBuf;

use crosswalk_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("control catalog not found at {0:?}; run catalog ingestion first")]
    DatabaseMissing(PathBuf),
    #[error("control catalog is malformed: {0}")]
    DatabaseMalformed(String),
    #[error("control catalog contains no controls")]
    EmptyCatalog,
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, MappingError>;

impl MappingError {
    pub(crate) fn model(err: impl std::fmt::Display) -> Self {
        Self::ModelInvocation(err.to_string())
    }
}

impl From<CatalogError> for MappingError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Missing(path) => Self::DatabaseMissing(path),
            CatalogError::Malformed { path, reason } => {
                Self::DatabaseMalformed(format!("{}: {reason}", path.display()))
            }
            CatalogError::Io(err) => Self::DatabaseMalformed(format!("unreadable catalog: {err}")),
        }
    }
}
