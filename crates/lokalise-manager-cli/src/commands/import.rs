use std::sync::Arc;

use anyhow::Result;
use lokalise_manager::{Defaults, Overrides};
use lokalise_manager_api::LokaliseClientFactory;
use tracing::info;

/// Download the project bundle into the locales directory.
pub async fn run(overrides: Overrides) -> Result<()> {
    let importer = lokalise_manager::importer(
        &Defaults::default(),
        overrides,
        Arc::new(LokaliseClientFactory::new()),
    )?;

    if !importer.import().await? {
        info!("import cancelled by user");
    }
    Ok(())
}
