use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("control catalog not found at {0:?}")]
    Missing(PathBuf),
    #[error("malformed control catalog {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
