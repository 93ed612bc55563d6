mod error;
mod record;
mod store;

pub use error::{CatalogError, Result};
pub use record::{ControlRecord, JsonlWriter, Regulations};
pub use store::{load_catalog, Catalog, CatalogStore};
