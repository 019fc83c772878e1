mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use lokalise_manager::Overrides;
use tracing_subscriber::EnvFilter;

use crate::config::Task;

#[derive(Parser)]
#[command(name = "lokalise-manager")]
#[command(about = "Exchange translation files with a Lokalise project")]
struct Cli {
    /// Config file (defaults to ./lokalise.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CommonArgs {
    /// Lokalise API token
    #[arg(long, global = true, env = "LOKALISE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    /// Lokalise project ID
    #[arg(long, global = true, env = "LOKALISE_PROJECT_ID")]
    project_id: Option<String>,
    /// Project branch
    #[arg(long, global = true)]
    branch: Option<String>,
    /// Directory holding the translation files
    #[arg(long, global = true)]
    locales_path: Option<PathBuf>,
    /// Do not print notices
    #[arg(long, global = true)]
    silent: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload local translation files to the project
    Export {
        /// Keep uploading after a file fails
        #[arg(long)]
        no_fail_fast: bool,
    },
    /// Download the project's translations into the locales directory
    Import {
        /// Build the bundle in the background and poll for it
        #[arg(long = "async")]
        async_download: bool,
        /// Ask before writing into a non-empty directory
        #[arg(long)]
        safe_mode: bool,
    },
}

impl Command {
    fn task(&self) -> Task {
        match self {
            Command::Export { .. } => Task::Export,
            Command::Import { .. } => Task::Import,
        }
    }
}

/// Config file values first, then anything given on the command line.
fn build_overrides(cli: &Cli) -> Result<Overrides> {
    let task = cli.command.task();
    let mut overrides = match config::resolve_config_path(cli.config.as_deref()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            Overrides::from_map(config::load_file(&path, task)?)
        }
        None => Overrides::new(),
    };

    let common = &cli.common;
    if let Some(token) = &common.api_token {
        overrides = overrides.set("api_token", token.as_str());
    }
    if let Some(project_id) = &common.project_id {
        overrides = overrides.set("project_id", project_id.as_str());
    }
    if let Some(branch) = &common.branch {
        overrides = overrides.set("branch", branch.as_str());
    }
    if let Some(path) = &common.locales_path {
        overrides = overrides.set("locales_path", path.to_string_lossy().into_owned());
    }
    if common.silent {
        overrides = overrides.set("silent_mode", true);
    }

    match cli.command {
        Command::Export { no_fail_fast } => {
            if no_fail_fast {
                overrides = overrides.set("raise_on_export_fail", false);
            }
        }
        Command::Import {
            async_download,
            safe_mode,
        } => {
            if async_download {
                overrides = overrides.set("import_async", true);
            }
            if safe_mode {
                overrides = overrides.set("import_safe_mode", true);
            }
        }
    }

    Ok(overrides)
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "warn,lokalise_manager=debug,lokalise_manager_api=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = build_overrides(&cli)?;

    match cli.command {
        Command::Export { .. } => commands::export::run(overrides).await,
        Command::Import { .. } => commands::import::run(overrides).await,
    }
}
