use std::path::PathBuf;

use anyhow::{bail, Result};
use crosswalk_llm::OutputSchema;
use crosswalk_mapper::{Mapper, StructuredModel};
use serde_json::Value;

use crate::cli::MapFormat;
use crate::config::AppConfig;
use crate::input;
use crate::render;

pub struct MapArgs {
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub persona: Option<String>,
    pub format: MapFormat,
    pub dry_run: bool,
}

struct Offline;

impl StructuredModel for Offline {
    fn invoke(&self, _system: &str, _user: &str, _schema: &OutputSchema) -> Result<Value> {
        bail!("no model is available during a dry run")
    }
}

pub fn run(config: &AppConfig, args: MapArgs) -> Result<()> {
    let text = input::map_input(args.text, args.file.as_deref())?;
    let top_k = args.top_k.unwrap_or(config.mapping.top_k);
    let store = config.catalog_store();
    let mapper_config = config.mapper_config()?;

    if args.dry_run {
        let mapper = Mapper::new(&store, &Offline).with_config(mapper_config);
        let prepared = mapper.prepare(&text, top_k, args.persona.as_deref())?;
        print!("{}", render::prepared_text(&prepared));
        return Ok(());
    }

    let client = config.llm_client()?;
    let mapper = Mapper::new(&store, &client).with_config(mapper_config);
    let result = mapper.map(&text, top_k, args.persona.as_deref())?;
    let out = match args.format {
        MapFormat::Text => render::mapping_text(&result),
        MapFormat::Json => render::mapping_json(&result)? + "\n",
        MapFormat::Csv => render::mapping_csv(&result)?,
    };
    print!("{out}");
    Ok(())
}
