use crosswalk_llm::OutputSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{MappingError, Result};
use crate::types::{MappedControl, MappingResult, ScopeRecommendation};

pub fn mapping_schema() -> OutputSchema {
    OutputSchema::new(
        "MappingResult",
        json!({
            "type": "object",
            "properties": {
                "mappings": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "control_id": {
                                "type": "string",
                                "description": "The exact SCF ID, e.g. 'GOV-01'"
                            },
                            "domain": {
                                "type": "string",
                                "description": "The primary SCF Domain"
                            },
                            "confidence": {
                                "type": "integer",
                                "minimum": 0,
                                "maximum": 100,
                                "description": "Confidence score from 0 to 100"
                            },
                            "justification": {
                                "type": "string",
                                "description": "A concise 1-sentence justification for why this control matches the input."
                            }
                        },
                        "required": ["control_id", "domain", "confidence", "justification"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["mappings"],
            "additionalProperties": false
        }),
    )
}

pub fn scope_schema() -> OutputSchema {
    OutputSchema::new(
        "ScopeRecommendation",
        json!({
            "type": "object",
            "properties": {
                "recommended_domains": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of major SCF Domains relevant to the audit scope."
                },
                "recommended_control_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "List of specific SCF Control IDs recommended for testing based on the scope."
                },
                "reasoning": {
                    "type": "string",
                    "description": "A brief comprehensive explanation of why these areas were selected based on the scope."
                }
            },
            "required": ["recommended_domains", "recommended_control_ids", "reasoning"],
            "additionalProperties": false
        }),
    )
}

#[derive(Deserialize)]
struct ModelMapping {
    control_id: String,
    domain: String,
    confidence: i64,
    justification: String,
}

pub(crate) fn parse_mapping_response(value: Value) -> Result<MappingResult> {
    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("mappings").ok_or_else(|| {
            MappingError::ModelInvocation("response has no `mappings` field".to_string())
        })?,
        other => {
            return Err(MappingError::ModelInvocation(format!(
                "expected an object with `mappings`, got {}",
                kind_of(&other)
            )))
        }
    };
    let raw: Vec<ModelMapping> = serde_json::from_value(items)
        .map_err(|err| MappingError::ModelInvocation(format!("invalid mapping entry: {err}")))?;
    let mut mappings = Vec::with_capacity(raw.len());
    for entry in raw {
        let confidence = u8::try_from(entry.confidence)
            .ok()
            .filter(|value| *value <= 100)
            .ok_or_else(|| {
                MappingError::ModelInvocation(format!(
                    "confidence {} for {} is outside 0..=100",
                    entry.confidence, entry.control_id
                ))
            })?;
        mappings.push(MappedControl::new(
            entry.control_id,
            entry.domain,
            confidence,
            entry.justification,
        ));
    }
    Ok(MappingResult::new(mappings))
}

pub(crate) fn parse_scope_response(value: Value) -> Result<ScopeRecommendation> {
    serde_json::from_value(value)
        .map_err(|err| MappingError::ModelInvocation(format!("invalid scope recommendation: {err}")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_and_bare_arrays_are_accepted() {
        let entry = json!({
            "control_id": "CRY-01",
            "domain": "Cryptography",
            "confidence": 90,
            "justification": "AES-256 at rest."
        });
        let wrapped = parse_mapping_response(json!({ "mappings": [entry.clone()] })).unwrap();
        let bare = parse_mapping_response(json!([entry])).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.mappings[0].confidence, 90);
        assert!(wrapped.mappings[0].regulations.is_empty());
    }

    #[test]
    fn model_supplied_regulations_are_ignored() {
        let result = parse_mapping_response(json!({
            "mappings": [{
                "control_id": "CRY-01",
                "domain": "Cryptography",
                "confidence": 70,
                "justification": "x",
                "regulations": {"MADE UP": "1.2"},
                "description": "invented"
            }]
        }))
        .unwrap();
        assert!(result.mappings[0].regulations.is_empty());
        assert!(result.mappings[0].description.is_none());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        for confidence in [101, -1, 1000] {
            let err = parse_mapping_response(json!({
                "mappings": [{
                    "control_id": "CRY-01",
                    "domain": "Cryptography",
                    "confidence": confidence,
                    "justification": "x"
                }]
            }))
            .unwrap_err();
            assert!(matches!(err, MappingError::ModelInvocation(_)));
        }
    }

    #[test]
    fn missing_fields_are_rejected() {
        let err = parse_mapping_response(json!({
            "mappings": [{ "control_id": "CRY-01", "confidence": 50 }]
        }))
        .unwrap_err();
        assert!(matches!(err, MappingError::ModelInvocation(_)));
        assert!(parse_mapping_response(json!({ "results": [] })).is_err());
        assert!(parse_mapping_response(json!("CRY-01")).is_err());
    }

    #[test]
    fn empty_mapping_list_is_valid() {
        let result = parse_mapping_response(json!({ "mappings": [] })).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn scope_response_requires_every_field() {
        let ok = parse_scope_response(json!({
            "recommended_domains": ["Governance", "Risk"],
            "recommended_control_ids": ["GOV-01", "RSK-02"],
            "reasoning": "The scope covers overall governance."
        }))
        .unwrap();
        assert_eq!(ok.recommended_domains.len(), 2);
        assert!(ok.recommended_control_ids.contains(&"GOV-01".to_string()));

        let err = parse_scope_response(json!({ "recommended_domains": [] })).unwrap_err();
        assert!(matches!(err, MappingError::ModelInvocation(_)));
    }

    #[test]
    fn schemas_name_their_shapes() {
        assert_eq!(mapping_schema().name, "MappingResult");
        assert_eq!(scope_schema().name, "ScopeRecommendation");
        assert_eq!(
            scope_schema().schema["required"],
            json!(["recommended_domains", "recommended_control_ids", "reasoning"])
        );
    }
}
