use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::record::ControlRecord;

pub fn load_catalog(path: &Path) -> Result<Vec<ControlRecord>> {
    if !path.exists() {
        return Err(CatalogError::Missing(path.to_path_buf()));
    }
    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false);
    if is_jsonl {
        read_jsonl(path)
    } else {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|err| CatalogError::Malformed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<ControlRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ControlRecord =
            serde_json::from_str(&line).map_err(|err| CatalogError::Malformed {
                path: path.to_path_buf(),
                reason: format!("line {}: {err}", idx + 1),
            })?;
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ControlRecord>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_records(records: Vec<ControlRecord>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            // last occurrence wins when ingestion produced duplicate ids
            by_id.insert(record.control_id.clone(), idx);
        }
        Self { records, by_id }
    }

    pub fn records(&self) -> &[ControlRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, control_id: &str) -> Option<&ControlRecord> {
        self.by_id.get(control_id).map(|idx| &self.records[*idx])
    }

    pub fn domains(&self) -> Vec<&str> {
        let set: IndexSet<&str> = self
            .records
            .iter()
            .map(|record| record.domain.as_str())
            .collect();
        set.into_iter().collect()
    }
}

/// Handle to the on-disk catalog shared by the mapping components.
///
/// Construction performs no I/O. The first `snapshot` loads the file; later calls
/// return the cached snapshot until `refresh` replaces it. A refresh is fully loaded
/// before it becomes visible, so readers never observe a partial catalog.
pub struct CatalogStore {
    path: PathBuf,
    current: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    pub fn from_catalog(path: impl Into<PathBuf>, catalog: Catalog) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Some(Arc::new(catalog))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.current.read().as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let mut slot = self.current.write();
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(self.read_from_disk()?);
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    pub fn refresh(&self) -> Result<Arc<Catalog>> {
        let catalog = Arc::new(self.read_from_disk()?);
        *self.current.write() = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    fn read_from_disk(&self) -> Result<Catalog> {
        debug!(path = %self.path.display(), "loading control catalog");
        let records = load_catalog(&self.path)?;
        info!(controls = records.len(), path = %self.path.display(), "control catalog loaded");
        Ok(Catalog::from_records(records))
    }
}
