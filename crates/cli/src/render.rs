use std::collections::BTreeSet;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use crosswalk_catalog::{Catalog, ControlRecord, JsonlWriter, Regulations};
use crosswalk_mapper::{
    priority_regulations, BatchReport, MappingResult, PreparedMapping, ScopeRecommendation,
};
use serde_json::json;

use crate::reconcile::Reconciled;

pub fn mapping_text(result: &MappingResult) -> String {
    if result.is_empty() {
        return "No relevant controls found.\n".to_string();
    }
    let mut out = format!("Mapped {} control(s):\n", result.len());
    for mapping in result.iter() {
        let _ = writeln!(
            out,
            " - {} ({}) [Confidence: {}%]",
            mapping.control_id, mapping.domain, mapping.confidence
        );
        let _ = writeln!(out, "   Justification: {}", mapping.justification);
        if let Some(line) = frameworks_line(&mapping.regulations) {
            let _ = writeln!(out, "   Priority Framework Mappings: {line}");
        }
    }
    out
}

fn frameworks_line(regulations: &Regulations) -> Option<String> {
    if regulations.is_empty() {
        return None;
    }
    let (priority, other) = priority_regulations(regulations);
    let mut line = join_regulations(&priority);
    if !other.is_empty() {
        if !line.is_empty() {
            line.push(' ');
        }
        let _ = write!(line, "(+{} minor framework mappings)", other.len());
    }
    Some(line)
}

pub fn mapping_json(result: &MappingResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn mapping_csv(result: &MappingResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Control ID",
        "Domain",
        "Description",
        "Justification",
        "Confidence",
        "Regulations",
    ])?;
    for mapping in result.iter() {
        let confidence = format!("{}%", mapping.confidence);
        let regulations = join_regulations(&mapping.regulations);
        writer.write_record([
            mapping.control_id.as_str(),
            mapping.domain.as_str(),
            mapping.description.as_deref().unwrap_or_default(),
            mapping.justification.as_str(),
            confidence.as_str(),
            regulations.as_str(),
        ])?;
    }
    finish_csv(writer)
}

pub fn prepared_text(prepared: &PreparedMapping) -> String {
    let tokens = prepared
        .context_tokens
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "# candidates: {}{}\n# context tokens: {tokens}\n\n## system\n{}\n\n## user\n{}\n",
        prepared.candidate_count,
        if prepared.fallback_used { " (fallback)" } else { "" },
        prepared.system,
        prepared.user
    )
}

pub fn scope_text(recommendation: &ScopeRecommendation, reconciled: &[Reconciled]) -> String {
    let mut out = String::from("Recommended Domains:\n");
    for domain in &recommendation.recommended_domains {
        let _ = writeln!(out, " - {domain}");
    }
    out.push_str("\nRecommended Controls:\n");
    for entry in reconciled {
        let _ = match entry {
            Reconciled::Exact { id } => writeln!(out, " - {id}"),
            Reconciled::Closest {
                id,
                catalog_id,
                similarity,
            } => writeln!(
                out,
                " - {id} (not in catalog; closest {catalog_id}, {:.0}% similar)",
                similarity * 100.0
            ),
            Reconciled::Unknown { id } => writeln!(out, " - {id} (unknown control)"),
        };
    }
    let _ = write!(out, "\nReasoning:\n{}\n", recommendation.reasoning);
    out
}

pub fn scope_json(recommendation: &ScopeRecommendation, reconciled: &[Reconciled]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json!({
        "Recommended_Domains": recommendation.recommended_domains,
        "Recommended_Controls": recommendation.recommended_control_ids,
        "Reasoning": recommendation.reasoning,
        "Reconciliation": reconciled,
    }))?)
}

pub fn batch_json(report: &BatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn batch_jsonl(report: &BatchReport) -> Result<String> {
    let mut writer = JsonlWriter::new(Vec::new());
    for control in &report.controls {
        writer.write_record(control)?;
    }
    String::from_utf8(writer.into_inner()).context("batch output is not UTF-8")
}

pub fn batch_csv(report: &BatchReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Control ID",
        "Domain",
        "Description",
        "Priority Score",
        "Hits",
        "Weight",
        "Average Confidence",
        "Sample Justification",
        "Regulations",
    ])?;
    for control in &report.controls {
        writer.write_record([
            control.control_id.clone(),
            control.domain.clone(),
            control.description.clone(),
            control.priority_score.to_string(),
            control.hit_count.to_string(),
            control.weight.to_string(),
            format!("{}%", control.average_confidence),
            control.sample_justification.clone(),
            join_regulations(&control.regulations),
        ])?;
    }
    finish_csv(writer)
}

pub fn catalog_stats(catalog: &Catalog) -> String {
    let records = catalog.records();
    let frameworks: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.regulations.keys().map(String::as_str))
        .collect();
    let with_regulations = records.iter().filter(|r| !r.regulations.is_empty()).count();
    let weighted = records.iter().filter(|r| r.weight.is_some()).count();
    format!(
        "controls: {}\ndomains: {}\ncontrols with regulations: {with_regulations}\nframeworks: {}\nweighted controls: {weighted}\n",
        catalog.len(),
        catalog.domains().len(),
        frameworks.len()
    )
}

pub fn catalog_domains(catalog: &Catalog) -> String {
    let mut out = String::new();
    for domain in catalog.domains() {
        let count = catalog
            .records()
            .iter()
            .filter(|r| r.domain == domain)
            .count();
        let _ = writeln!(out, "{domain}\t{count}");
    }
    out
}

pub fn control_detail(record: &ControlRecord) -> String {
    let mut out = format!(
        "{} ({})\n{}\nweight: {}\n",
        record.control_id,
        record.domain,
        record.description,
        record.effective_weight()
    );
    if !record.regulations.is_empty() {
        let (priority, other) = priority_regulations(&record.regulations);
        out.push_str("regulations:\n");
        for (label, citation) in priority.iter().chain(other.iter()) {
            let _ = writeln!(out, "  {label}: {citation}");
        }
    }
    out
}

fn join_regulations(regulations: &Regulations) -> String {
    regulations
        .iter()
        .map(|(label, citation)| format!("{label}: {citation}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().context("failed to flush CSV")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosswalk_mapper::{BatchItemOutcome, MappedControl};

    fn enriched() -> MappingResult {
        let mut mapping = MappedControl::new("CRY-01", "Cryptographic Protections", 90, "AES-256 at rest.");
        mapping.description = Some("Encrypt data, at rest.".to_string());
        for (label, citation) in [
            ("COBIT 2019", "DSS05.02"),
            ("EMEA EU GDPR", "Art 32.1"),
            ("NIST 800-53 R5", "SC-28"),
            ("Shared Assessments SIG", "D.2"),
        ] {
            mapping.regulations.insert(label.to_string(), citation.to_string());
        }
        MappingResult::new(vec![mapping])
    }

    #[test]
    fn text_lists_priority_frameworks_and_counts_the_rest() {
        let text = mapping_text(&enriched());
        assert!(text.contains(" - CRY-01 (Cryptographic Protections) [Confidence: 90%]"));
        assert!(text.contains("   Justification: AES-256 at rest."));
        assert!(text.contains(
            "   Priority Framework Mappings: EMEA EU GDPR: Art 32.1; NIST 800-53 R5: SC-28 (+2 minor framework mappings)"
        ));
        assert_eq!(mapping_text(&MappingResult::default()), "No relevant controls found.\n");
    }

    #[test]
    fn csv_quotes_fields_and_marks_percent() {
        let csv = mapping_csv(&enriched()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Control ID,Domain,Description,Justification,Confidence,Regulations")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("CRY-01,Cryptographic Protections,\"Encrypt data, at rest.\","));
        assert!(row.contains(",90%,"));
    }

    #[test]
    fn scope_json_uses_report_keys() {
        let recommendation = ScopeRecommendation {
            recommended_domains: vec!["Governance".to_string()],
            recommended_control_ids: vec!["GOV-01".to_string()],
            reasoning: "Oversight.".to_string(),
        };
        let reconciled = vec![Reconciled::Exact { id: "GOV-01".to_string() }];
        let value: serde_json::Value =
            serde_json::from_str(&scope_json(&recommendation, &reconciled).unwrap()).unwrap();
        assert_eq!(value["Recommended_Controls"][0], "GOV-01");
        assert_eq!(value["Reconciliation"][0]["status"], "exact");
        let text = scope_text(&recommendation, &reconciled);
        assert!(text.starts_with("Recommended Domains:\n - Governance\n"));
        assert!(text.ends_with("Reasoning:\nOversight.\n"));
    }

    #[test]
    fn batch_formats_share_the_ranking() {
        let outcomes = vec![BatchItemOutcome {
            index: 0,
            result: Ok(enriched()),
        }];
        let report = BatchReport::from_outcomes(&outcomes, &Catalog::default());
        let jsonl = batch_jsonl(&report).unwrap();
        assert_eq!(jsonl.lines().count(), 1);
        assert!(jsonl.contains("\"priority_score\":1"));
        let csv = batch_csv(&report).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("CRY-01,"));
        let json: serde_json::Value = serde_json::from_str(&batch_json(&report).unwrap()).unwrap();
        assert_eq!(json["controls"][0]["hit_count"], 1);
    }

    #[test]
    fn control_detail_puts_priority_frameworks_first() {
        let record = ControlRecord::new("CRY-01", "Cryptographic Protections", "Encrypt.")
            .with_regulation("COBIT 2019", "DSS05.02")
            .with_regulation("GDPR", "Art. 32")
            .with_weight(3);
        let detail = control_detail(&record);
        assert!(detail.contains("weight: 3"));
        let gdpr = detail.find("GDPR").unwrap();
        let cobit = detail.find("COBIT").unwrap();
        assert!(gdpr < cobit);
    }
}
