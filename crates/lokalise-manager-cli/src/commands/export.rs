use std::sync::Arc;

use anyhow::Result;
use lokalise_manager::{Defaults, Overrides, UploadOutcome};
use lokalise_manager_api::LokaliseClientFactory;

/// Upload every translation file, then print one line per failure.
pub async fn run(overrides: Overrides) -> Result<()> {
    let exporter = lokalise_manager::exporter(
        &Defaults::default(),
        overrides,
        Arc::new(LokaliseClientFactory::new()),
    )?;

    let outcomes = exporter.export().await?;
    let failed = print_failures(&outcomes);

    if !exporter.settings().silent_mode {
        println!(
            "Uploaded {} files ({failed} failed).",
            outcomes.len() - failed
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to upload");
    }
    Ok(())
}

/// Print failed uploads to stderr. Returns how many there were.
fn print_failures(outcomes: &[UploadOutcome]) -> usize {
    let mut failed = 0;
    for outcome in outcomes {
        if let Some(error) = outcome.error() {
            eprintln!("error: {}: {error}", outcome.path().display());
            failed += 1;
        }
    }
    failed
}
