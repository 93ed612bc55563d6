mod batch;
mod catalog;
mod cli;
mod config;
mod input;
mod map;
mod reconcile;
mod render;
mod scope;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::batch::BatchArgs;
use crate::cli::{Cli, Command};
use crate::config::load_config;
use crate::map::MapArgs;

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    config.apply_env()?;
    if let Some(path) = cli.catalog {
        config.catalog.path = path;
    }
    if let Some(provider) = cli.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = cli.model {
        config.llm.model = Some(model);
    }

    match cli.command {
        Command::Map {
            text,
            file,
            top_k,
            persona,
            format,
            dry_run,
        } => map::run(
            &config,
            MapArgs {
                text,
                file,
                top_k,
                persona,
                format,
                dry_run,
            },
        ),
        Command::Scope { file, format } => scope::run(&config, &file, format),
        Command::Batch {
            inputs,
            top_k,
            concurrency,
            persona,
            format,
        } => batch::run(
            &config,
            BatchArgs {
                inputs,
                top_k,
                concurrency,
                persona,
                format,
            },
        ),
        Command::Catalog { command } => catalog::run(&config, command),
    }
}

// stderr keeps stdout clean for JSON and CSV output
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
