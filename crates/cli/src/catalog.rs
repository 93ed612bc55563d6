use anyhow::{anyhow, Result};

use crate::cli::CatalogCommand;
use crate::config::AppConfig;
use crate::render;

pub fn run(config: &AppConfig, command: CatalogCommand) -> Result<()> {
    let store = config.catalog_store();
    let catalog = store.snapshot()?;
    let out = match command {
        CatalogCommand::Stats => render::catalog_stats(&catalog),
        CatalogCommand::Domains => render::catalog_domains(&catalog),
        CatalogCommand::Show { control_id } => {
            let record = catalog.get(control_id.trim()).ok_or_else(|| {
                anyhow!(
                    "control {control_id} not found in {}",
                    store.path().display()
                )
            })?;
            render::control_detail(record)
        }
    };
    print!("{out}");
    Ok(())
}
