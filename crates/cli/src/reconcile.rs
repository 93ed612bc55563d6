use crosswalk_catalog::Catalog;
use serde::Serialize;
use strsim::normalized_levenshtein;

const MIN_SIMILARITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reconciled {
    Exact { id: String },
    Closest { id: String, catalog_id: String, similarity: f64 },
    Unknown { id: String },
}

impl Reconciled {
    pub fn id(&self) -> &str {
        match self {
            Reconciled::Exact { id }
            | Reconciled::Closest { id, .. }
            | Reconciled::Unknown { id } => id,
        }
    }
}

pub fn reconcile(ids: &[String], catalog: &Catalog) -> Vec<Reconciled> {
    ids.iter().map(|id| reconcile_one(id, catalog)).collect()
}

fn reconcile_one(id: &str, catalog: &Catalog) -> Reconciled {
    if catalog.get(id).is_some() {
        return Reconciled::Exact { id: id.to_string() };
    }
    let wanted = id.trim().to_uppercase();
    let mut best: Option<(&str, f64)> = None;
    for record in catalog.records() {
        let score = normalized_levenshtein(&wanted, &record.control_id.to_uppercase());
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((&record.control_id, score));
        }
    }
    match best {
        Some((catalog_id, similarity)) if similarity > MIN_SIMILARITY => Reconciled::Closest {
            id: id.to_string(),
            catalog_id: catalog_id.to_string(),
            similarity,
        },
        _ => Reconciled::Unknown { id: id.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosswalk_catalog::ControlRecord;

    fn catalog() -> Catalog {
        Catalog::from_records(vec![
            ControlRecord::new("GOV-01", "Governance", "a"),
            ControlRecord::new("IAC-06.1", "Identification & Authentication", "b"),
            ControlRecord::new("CRY-05", "Cryptographic Protections", "c"),
        ])
    }

    #[test]
    fn ids_are_matched_exactly_then_by_similarity() {
        let ids = vec![
            "GOV-01".to_string(),
            "iac-06.1".to_string(),
            "IAC-06.7".to_string(),
            "BCD-11".to_string(),
        ];
        let result = reconcile(&ids, &catalog());
        assert_eq!(result[0], Reconciled::Exact { id: "GOV-01".to_string() });
        match &result[1] {
            Reconciled::Closest { catalog_id, similarity, .. } => {
                assert_eq!(catalog_id, "IAC-06.1");
                assert!((similarity - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &result[2] {
            Reconciled::Closest { catalog_id, similarity, .. } => {
                assert_eq!(catalog_id, "IAC-06.1");
                assert!(*similarity > 0.8);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(result[3], Reconciled::Unknown { id: "BCD-11".to_string() });
        assert_eq!(result[3].id(), "BCD-11");
    }

    #[test]
    fn one_edit_on_a_short_id_passes_two_do_not() {
        // 1 edit over 6 chars is 0.83; 2 edits is 0.67
        let ids = vec!["CRY-06".to_string(), "CRX-06".to_string()];
        let result = reconcile(&ids, &catalog());
        assert!(matches!(result[0], Reconciled::Closest { .. }));
        assert!(matches!(result[1], Reconciled::Unknown { .. }));
    }
}
