use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use foldertag::cli::{Cli, Commands};
use foldertag::{commands, AppContext};
use foldertag_core::storage::{Vault, INTERNAL_DIR_NAME};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file if present

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cx = AppContext {
        vault: find_vault(cli.vault.clone()).await,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init { path } => commands::handle_init(path, cx).await?,
        Commands::Tag(args) => commands::handle_tag(args, cx).await?,
        Commands::TagFolder(args) => commands::handle_tag_folder(args, cx).await?,
        Commands::New(args) => commands::handle_new(args, cx).await?,
        Commands::Mv(args) => commands::handle_mv(args, cx).await?,
        Commands::Select(args) => commands::handle_select(args, cx).await?,
        Commands::Tags {} => commands::handle_tags(cx).await?,
        Commands::Folders {} => commands::handle_folders(cx).await?,
        Commands::Watch {} => commands::handle_watch(cx).await?,
        Commands::Config(args) => commands::handle_config(args, cx).await?,
    }

    Ok(())
}

/// Logs go to stderr. `RUST_LOG` applies unless `-v` or `-q` is given.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let directives = format!("foldertag={level},foldertag_core={level}");
    let filter = if quiet || verbose > 0 {
        EnvFilter::new(directives)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn find_vault(cli_vault_flag: Option<PathBuf>) -> Result<Arc<Vault>> {
    if let Some(vault_path) = cli_vault_flag {
        return Vault::open(&vault_path)
            .await
            .with_context(|| format!("Failed to open vault at {}", vault_path.display()));
    }

    // Find the nearest directory containing a .foldertag directory
    let mut dir = std::env::current_dir()?;
    loop {
        if tokio::fs::metadata(dir.join(INTERNAL_DIR_NAME))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Ok(Vault::open(&dir).await?);
        }
        debug!("No vault at {}", dir.display());
        if !dir.pop() {
            break;
        }
    }

    Err(anyhow::anyhow!(
        "No vault found in current directory or its parents (run `foldertag init`, or pass --vault)"
    ))
}
