use crosswalk_catalog::{Catalog, Regulations};

use crate::types::MappingResult;

pub const PRIORITY_FRAMEWORKS: [&str; 7] = ["gdpr", "iso", "nist", "soc", "pci", "ccpa", "hipaa"];

pub fn enrich(result: &mut MappingResult, catalog: &Catalog) -> usize {
    let mut matched = 0;
    for mapping in &mut result.mappings {
        if let Some(record) = catalog.get(&mapping.control_id) {
            mapping.regulations = record.regulations.clone();
            mapping.description = Some(record.description.clone());
            matched += 1;
        }
    }
    matched
}

pub fn priority_regulations(regulations: &Regulations) -> (Regulations, Regulations) {
    let mut priority = Regulations::new();
    let mut other = Regulations::new();
    for (label, citation) in regulations {
        let lower = label.to_lowercase();
        if PRIORITY_FRAMEWORKS.iter().any(|p| lower.contains(p)) {
            priority.insert(label.clone(), citation.clone());
        } else {
            other.insert(label.clone(), citation.clone());
        }
    }
    (priority, other)
}
