use std::fmt;

use crosswalk_catalog::{ControlRecord, Regulations};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingCandidate<'a> {
    pub control_id: &'a str,
    pub domain: &'a str,
    pub description: &'a str,
}

impl<'a> From<&'a ControlRecord> for MappingCandidate<'a> {
    fn from(record: &'a ControlRecord) -> Self {
        Self {
            control_id: &record.control_id,
            domain: &record.domain,
            description: &record.description,
        }
    }
}

impl fmt::Display for MappingCandidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.control_id, self.domain, self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedControl {
    pub control_id: String,
    pub domain: String,
    pub confidence: u8,
    pub justification: String,
    #[serde(default)]
    pub regulations: Regulations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MappedControl {
    pub fn new(
        control_id: impl Into<String>,
        domain: impl Into<String>,
        confidence: u8,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            control_id: control_id.into(),
            domain: domain.into(),
            confidence,
            justification: justification.into(),
            regulations: Regulations::new(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    pub mappings: Vec<MappedControl>,
}

impl MappingResult {
    pub fn new(mappings: Vec<MappedControl>) -> Self {
        Self { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedControl> {
        self.mappings.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeRecommendation {
    pub recommended_domains: Vec<String>,
    pub recommended_control_ids: Vec<String>,
    pub reasoning: String,
}
