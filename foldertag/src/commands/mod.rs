use std::path::PathBuf;

use anyhow::{bail, Result};
use console::style;
use foldertag_core::selection::{apply_tags, NewTag, TagCatalog, TagSelection};
use foldertag_core::frontmatter::Note;
use foldertag_core::storage::{Storage, Vault, VaultFile, VaultTree};
use foldertag_core::watcher::watch;
use foldertag_core::{ActiveFileOutcome, SyncHandle};
use tracing::{error, info};

use crate::cli::{ConfigArgs, ConfigCommands, MvArgs, NewArgs, SelectArgs, TagArgs, TagFolderArgs};
use crate::{prompt, resolve_file, resolve_vault_path, AppContext};

fn hashtag(tag: &str) -> console::StyledObject<String> {
    style(format!("#{}", tag)).cyan()
}

// --- Handler Functions ---

pub async fn handle_init(path: Option<PathBuf>, cx: AppContext) -> Result<()> {
    let target = match (path, &cx.vault) {
        (Some(path), _) => path,
        (None, Ok(vault)) => {
            if vault.is_initialized().await {
                error!("Cannot create a new vault while in an existing one.");
                bail!("Cannot create a new vault while in an existing one.");
            }
            // `--vault` pointed at a plain directory
            vault.path().to_path_buf()
        }
        (None, Err(_)) => std::env::current_dir()?,
    };
    info!("Creating vault at: {}", target.display());
    let vault = Vault::init(&target).await?;
    cx.report(format!("Vault initialized at {}", vault.path().display()));
    Ok(())
}

pub async fn handle_tag(args: TagArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let sync = cx.synchronizer()?;
    let handle = sync.subscribe(&vault.on);

    let file = resolve_file(vault, &args.file).await?;
    let file = vault.open_file(file.path()).await?;
    let outcome = sync.add_folder_tag_to_active_file(&file).await;
    handle.shutdown().await;

    match outcome? {
        ActiveFileOutcome::Tagged(tag) => cx.report(format!("Added tag {} to {}", hashtag(&tag), file)),
        ActiveFileOutcome::AlreadyTagged(tag) => cx.report(format!("{} already has tag {}", file, hashtag(&tag))),
        ActiveFileOutcome::NoFolder => cx.report(format!("{} is not in a folder", file)),
        ActiveFileOutcome::Excluded => bail!(
            "{} files are not supported",
            file.extension().to_ascii_uppercase()
        ),
    }
    Ok(())
}

pub async fn handle_tag_folder(args: TagFolderArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let folder = resolve_vault_path(vault, &args.folder).await?;
    if !vault.list_folders().await?.contains(&folder) {
        bail!("Folder not found in vault: {}", folder);
    }

    let report = cx.synchronizer()?.add_folder_tag_to_folder(&folder).await?;
    cx.report(format!(
        "Added folder tags to {} files ({} files already had the tag)",
        report.processed, report.skipped
    ));
    Ok(())
}

pub async fn handle_new(args: NewArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let sync = cx.synchronizer()?;
    let handle = sync.subscribe(&vault.on);
    let result = create_note(&args, &cx, vault, &handle).await;
    handle.shutdown().await;
    result
}

async fn create_note(args: &NewArgs, cx: &AppContext, vault: &Vault, handle: &SyncHandle) -> Result<()> {
    let file = vault.create_file(&args.path, args.content.as_deref().unwrap_or("")).await?;
    // Let the folder tag land before anything else touches the file
    handle.flush().await;
    cx.report(format!("Created {}", file));

    if args.select {
        let catalog = TagCatalog::build(vault).await?;
        let tags = prompt::select_tags(TagSelection::new(catalog), vault).await?;
        apply_and_report(cx, vault, &file, &tags).await?;
    }
    Ok(())
}

pub async fn handle_mv(args: MvArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let file = resolve_file(vault, &args.from).await?;
    let sync = cx.synchronizer()?;
    let handle = sync.subscribe(&vault.on);
    let result = vault.rename_file(&file, &args.to).await;
    handle.shutdown().await;

    cx.report(format!("Moved {} to {}", file, result?));
    Ok(())
}

pub async fn handle_select(args: SelectArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let file = resolve_file(vault, &args.file).await?;
    let mut selection = TagSelection::new(TagCatalog::build(&**vault).await?);

    let tags = if args.has_selection() {
        if let Some(folder_tag) = &args.folder_tag {
            if !selection.select_folder_tag(folder_tag) {
                bail!("{} is not a folder tag", hashtag(folder_tag));
            }
        }
        for tag in &args.tags {
            let tag = tag.trim();
            let tag = tag.strip_prefix('#').unwrap_or(tag);
            if selection.catalog().other().iter().any(|t| t == tag) {
                selection.set_other_tag(tag, true);
            } else if let NewTag::Ignored = selection.add_new_tag(tag, false, &**vault).await? {
                info!("Ignoring tag #{}", tag);
            }
        }
        if let Some(name) = &args.create_folder {
            if let NewTag::CreatedFolder(tag) = selection.add_new_tag(name, true, &**vault).await? {
                cx.report(format!("Created tag {} and folder {}", hashtag(&tag), tag));
            }
        }
        selection.submit()
    } else {
        prompt::select_tags(selection, vault).await?
    };

    let sync = cx.synchronizer()?;
    let handle = sync.subscribe(&vault.on);
    let result = apply_and_report(&cx, vault, &file, &tags).await;
    handle.shutdown().await;
    result.map(|_| ())
}

async fn apply_and_report(
    cx: &AppContext,
    vault: &Vault,
    file: &VaultFile,
    tags: &[String],
) -> Result<VaultFile> {
    let final_file = apply_tags(vault, file, tags).await?;
    let applied = Storage::read(vault, &final_file)
        .await
        .map(|content| Note::parse(&content).tags())
        .unwrap_or_default();
    if !applied.is_empty() {
        let list: Vec<String> = applied.iter().map(|t| hashtag(t).to_string()).collect();
        cx.report(format!("Tags on {}: {}", final_file, list.join(", ")));
    }
    if &final_file != file {
        cx.report(format!("Moved {} to {}", file, final_file));
    }
    Ok(final_file)
}

pub async fn handle_tags(cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let catalog = TagCatalog::build(&**vault).await?;

    println!("{}", style("Folder-matching tags").bold());
    for tag in catalog.folder_matching() {
        println!("  {}", hashtag(tag));
    }
    println!("{}", style("Other tags").bold());
    for tag in catalog.other() {
        println!("  {}", hashtag(tag));
    }
    Ok(())
}

pub async fn handle_folders(cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let folders = vault.list_folders().await?;
    cx.report(format!("Found {} folders:", folders.len()));
    for folder in folders {
        println!("{}", folder);
    }
    Ok(())
}

pub async fn handle_watch(cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    let sync = cx.synchronizer()?;
    let handle = sync.subscribe(&vault.on);
    let watcher = watch(vault.clone())?;
    cx.report(format!(
        "Watching {} for new and moved files. Press Ctrl-C to stop.",
        vault.path().display()
    ));

    tokio::signal::ctrl_c().await?;
    info!("Stopping watch");
    watcher.stop().await;
    handle.shutdown().await;
    Ok(())
}

pub async fn handle_config(args: ConfigArgs, cx: AppContext) -> Result<()> {
    let vault = cx.vault()?;
    match args.command {
        ConfigCommands::Get { key } => {
            println!("{}", vault.settings().get(&key)?);
        }
        ConfigCommands::Set { key, value } => {
            let mut settings = vault.settings().clone();
            settings.set(&key, &value)?;
            vault.save_settings(&settings).await?;
            cx.report(format!("{} = {}", key, settings.get(&key)?));
        }
        ConfigCommands::List {} => {
            for (key, value) in vault.settings().entries() {
                println!("{} = {}", key, value);
            }
        }
        ConfigCommands::Locate {} => {
            let path = vault.config_path();
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                println!("{}", path.display());
            } else {
                println!("{} (not created yet, defaults apply)", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldertag_core::storage::INTERNAL_DIR_NAME;
    use tempfile::tempdir;

    fn context_for(vault: foldertag_core::storage::Result<std::sync::Arc<Vault>>) -> AppContext {
        AppContext {
            vault: vault.map_err(Into::into),
            quiet: true,
        }
    }

    #[tokio::test]
    async fn init_uses_uninitialized_vault_dir() {
        let dir = tempdir().unwrap();

        let cx = context_for(Vault::open(dir.path()).await);
        handle_init(None, cx).await.unwrap();
        assert!(dir.path().join(INTERNAL_DIR_NAME).is_dir());

        let cx = context_for(Vault::open(dir.path()).await);
        assert!(handle_init(None, cx).await.is_err());
    }
}
