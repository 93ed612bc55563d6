use std::path::PathBuf;

use anyhow::{bail, Result};
use crosswalk_mapper::{map_batch, BatchReport, Mapper};
use tracing::info;

use crate::cli::BatchFormat;
use crate::config::AppConfig;
use crate::input;
use crate::render;

pub struct BatchArgs {
    pub inputs: Vec<PathBuf>,
    pub top_k: Option<usize>,
    pub concurrency: Option<usize>,
    pub persona: Option<String>,
    pub format: BatchFormat,
}

pub fn run(config: &AppConfig, args: BatchArgs) -> Result<()> {
    let items = input::batch_items(&args.inputs)?;
    let top_k = args.top_k.unwrap_or(config.mapping.top_k);
    let concurrency = args.concurrency.unwrap_or(config.batch.concurrency);
    info!(items = items.len(), concurrency, top_k, "starting batch");

    let store = config.catalog_store();
    let client = config.llm_client()?;
    let mapper = Mapper::new(&store, &client).with_config(config.mapper_config()?);
    let outcomes = map_batch(&mapper, &items, top_k, args.persona.as_deref(), concurrency)?;
    let catalog = store.snapshot()?;
    let report = BatchReport::from_outcomes(&outcomes, &catalog);

    for failure in &report.failed {
        eprintln!("item {} failed: {}", failure.index, failure.error);
    }
    let out = match args.format {
        BatchFormat::Json => render::batch_json(&report)? + "\n",
        BatchFormat::Csv => render::batch_csv(&report)?,
        BatchFormat::Jsonl => render::batch_jsonl(&report)?,
    };
    print!("{out}");
    if report.all_failed() {
        bail!("all {} batch items failed", report.items_total);
    }
    Ok(())
}
