use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use crosswalk_catalog::CatalogStore;
use crosswalk_llm::OutputSchema;
use crosswalk_mapper::{Mapper, MappingError, ScopeAnalyzer, StructuredModel};
use serde_json::{json, Value};
use tempfile::TempDir;

const CATALOG: &str = r#"[
  {
    "control_id": "GOV-01",
    "domain": "Cybersecurity & Data Protection Governance",
    "description": "Mechanisms exist to facilitate the implementation of cybersecurity and data protection governance controls.",
    "regulations": { "NIST 800-53 R5": "PM-1" }
  },
  {
    "control_id": "CRY-01",
    "domain": "Cryptographic Protections",
    "description": "All sensitive data must be encrypted at rest utilizing AES-256.",
    "regulations": { "GDPR": "Art. 32" }
  }
]"#;

struct Fixed {
    reply: anyhow::Result<Value>,
    calls: AtomicUsize,
}

impl Fixed {
    fn ok(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(anyhow!(message.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StructuredModel for Fixed {
    fn invoke(&self, _system: &str, _user: &str, _schema: &OutputSchema) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(value) => Ok(value.clone()),
            Err(err) => Err(anyhow!("{err}")),
        }
    }
}

fn write_catalog(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("scf_parsed.json");
    fs::write(&path, body).expect("write catalog");
    path
}

fn cry_01_answer() -> Value {
    json!({
        "mappings": [{
            "control_id": "CRY-01",
            "domain": "Cryptographic Protections",
            "confidence": 90,
            "justification": "Encryption at rest is required."
        }]
    })
}

#[test]
fn encrypted_laptops_map_to_cry_01_with_crosswalk() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(write_catalog(dir.path(), CATALOG));
    let model = Fixed::ok(cry_01_answer());
    let mapper = Mapper::new(&store, &model);

    let result = mapper
        .map("All laptops must be encrypted at rest.", 3, None)
        .expect("mapping");
    assert_eq!(model.calls(), 1);
    assert_eq!(result.len(), 1);
    let mapping = &result.mappings[0];
    assert_eq!(mapping.control_id, "CRY-01");
    assert_eq!(mapping.confidence, 90);
    assert_eq!(mapping.regulations.len(), 1);
    assert_eq!(mapping.regulations["GDPR"], "Art. 32");
}

#[test]
fn missing_catalog_fails_before_the_model() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let store = CatalogStore::new(&path);
    let model = Fixed::ok(cry_01_answer());

    let err = Mapper::new(&store, &model)
        .map("encrypted at rest", 3, None)
        .unwrap_err();
    assert_eq!(err, MappingError::DatabaseMissing(path));
    let err = ScopeAnalyzer::new(&store, &model)
        .analyze("Annual audit of encryption.")
        .unwrap_err();
    assert!(matches!(err, MappingError::DatabaseMissing(_)));
    assert_eq!(model.calls(), 0);
}

#[test]
fn empty_and_malformed_catalogs_are_distinct_errors() {
    let dir = TempDir::new().unwrap();
    let model = Fixed::ok(cry_01_answer());

    let empty = CatalogStore::new(write_catalog(dir.path(), "[]"));
    assert_eq!(
        Mapper::new(&empty, &model).map("encrypted", 3, None).unwrap_err(),
        MappingError::EmptyCatalog
    );

    let broken_path = dir.path().join("broken.json");
    fs::write(&broken_path, "{ not json").unwrap();
    let broken = CatalogStore::new(broken_path);
    assert!(matches!(
        Mapper::new(&broken, &model).map("encrypted", 3, None),
        Err(MappingError::DatabaseMalformed(_))
    ));
    assert_eq!(model.calls(), 0);
}

#[test]
fn provider_failure_is_a_model_error() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(write_catalog(dir.path(), CATALOG));
    let model = Fixed::failing("401 unauthorized");
    let err = Mapper::new(&store, &model)
        .map("encrypted", 3, None)
        .unwrap_err();
    match err {
        MappingError::ModelInvocation(message) => assert!(message.contains("401")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unmatched_text_sends_the_catalog_head() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(write_catalog(dir.path(), CATALOG));
    let model = Fixed::ok(json!({ "mappings": [] }));
    let mapper = Mapper::new(&store, &model);

    let prepared = mapper.prepare("the cat sat", 3, None).unwrap();
    assert!(prepared.fallback_used);
    assert_eq!(prepared.candidate_count, 2);
    assert!(prepared.system.contains("[GOV-01]"));
    assert!(prepared.system.contains("[CRY-01]"));

    let result = mapper.map("the cat sat", 3, None).unwrap();
    assert!(result.is_empty());
}

#[test]
fn refresh_picks_up_a_rewritten_catalog() {
    let dir = TempDir::new().unwrap();
    let path = write_catalog(dir.path(), CATALOG);
    let store = CatalogStore::new(&path);
    let model = Fixed::ok(cry_01_answer());
    let mapper = Mapper::new(&store, &model);
    let before = mapper.map("encrypted", 3, None).unwrap();
    assert_eq!(before.mappings[0].regulations["GDPR"], "Art. 32");

    fs::write(
        &path,
        r#"[{"control_id":"CRY-01","domain":"Cryptographic Protections","description":"Encrypt.","regulations":{"PCI DSS v4.0":"3.5"}}]"#,
    )
    .unwrap();
    let cached = mapper.map("encrypted", 3, None).unwrap();
    assert!(cached.mappings[0].regulations.contains_key("GDPR"));

    store.refresh().unwrap();
    let after = mapper.map("encrypted", 3, None).unwrap();
    assert!(!after.mappings[0].regulations.contains_key("GDPR"));
    assert_eq!(after.mappings[0].regulations["PCI DSS v4.0"], "3.5");
}

#[test]
fn scope_analysis_returns_the_model_recommendation() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(write_catalog(dir.path(), CATALOG));
    let model = Fixed::ok(json!({
        "recommended_domains": ["Cryptographic Protections"],
        "recommended_control_ids": ["CRY-01", "CRY-09"],
        "reasoning": "Storage encryption is the focus of the scope."
    }));
    let recommendation = ScopeAnalyzer::new(&store, &model)
        .analyze("SOC 2 Type II review of data storage encryption.")
        .unwrap();
    assert_eq!(recommendation.recommended_control_ids, vec!["CRY-01", "CRY-09"]);
    assert_eq!(model.calls(), 1);
}

#[test]
fn aes_policy_selects_cry_01_and_gains_its_regulations() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(write_catalog(
        dir.path(),
        r#"[{"control_id":"CRY-01","domain":"Cryptography","description":"All sensitive data must be encrypted at rest utilizing AES-256.","regulations":{"GDPR":"Art. 32"}}]"#,
    ));
    let model = Fixed::ok(json!({
        "mappings": [{
            "control_id": "CRY-01",
            "domain": "Cryptography",
            "confidence": 90,
            "justification": "AES-256 encryption at rest."
        }]
    }));
    let mapper = Mapper::new(&store, &model);
    let input = "We encrypt all data at rest using AES-256.";

    let prepared = mapper.prepare(input, 3, None).unwrap();
    assert!(!prepared.fallback_used);
    assert_eq!(prepared.candidate_count, 1);

    let result = mapper.map(input, 3, None).unwrap();
    let regulations: Vec<(&str, &str)> = result.mappings[0]
        .regulations
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(regulations, vec![("GDPR", "Art. 32")]);
}
