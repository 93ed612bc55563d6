use std::io::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub type Regulations = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRecord {
    pub control_id: String,
    pub domain: String,
    pub description: String,
    #[serde(default)]
    pub regulations: Regulations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl ControlRecord {
    pub fn new(
        control_id: impl Into<String>,
        domain: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            control_id: control_id.into(),
            domain: domain.into(),
            description: description.into(),
            regulations: Regulations::new(),
            weight: None,
        }
    }

    pub fn with_regulation(mut self, label: impl Into<String>, citation: impl Into<String>) -> Self {
        self.regulations.insert(label.into(), citation.into());
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn effective_weight(&self) -> u32 {
        self.weight.unwrap_or(1)
    }
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record).map_err(std::io::Error::from)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regulations_and_weight_default_when_absent() {
        let raw = r#"{"control_id":"GOV-01","domain":"Governance","description":"Establish an Information Security Program."}"#;
        let record: ControlRecord = serde_json::from_str(raw).unwrap();
        assert!(record.regulations.is_empty());
        assert_eq!(record.weight, None);
        assert_eq!(record.effective_weight(), 1);
    }

    #[test]
    fn jsonl_writer_emits_one_line_per_record() {
        let record = ControlRecord::new("CRY-01", "Cryptography", "Encrypt data at rest.")
            .with_regulation("GDPR", "Art. 32")
            .with_weight(3);
        let mut writer = JsonlWriter::new(Vec::new());
        writer.write_record(&record).unwrap();
        writer.write_record(&record).unwrap();
        let buf = writer.into_inner();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ControlRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);
    }
}
