use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crosswalk_mapper::ScopeAnalyzer;

use crate::cli::ScopeFormat;
use crate::config::AppConfig;
use crate::reconcile::reconcile;
use crate::render;

pub fn run(config: &AppConfig, file: &Path, format: ScopeFormat) -> Result<()> {
    let scope_text = fs::read_to_string(file)
        .with_context(|| format!("failed to read scope document {}", file.display()))?;
    let store = config.catalog_store();
    let client = config.llm_client()?;
    let recommendation = ScopeAnalyzer::new(&store, &client).analyze(&scope_text)?;
    let catalog = store.snapshot()?;
    let reconciled = reconcile(&recommendation.recommended_control_ids, &catalog);
    let out = match format {
        ScopeFormat::Text => render::scope_text(&recommendation, &reconciled),
        ScopeFormat::Json => render::scope_json(&recommendation, &reconciled)? + "\n",
    };
    print!("{out}");
    Ok(())
}
