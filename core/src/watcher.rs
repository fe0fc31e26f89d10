//! Turns file system notifications for a vault directory into vault events.
//!
//! Changes made outside this process (an editor saving a new note, a file manager moving
//! one) reach the vault's listeners the same way as changes made through [`VaultTree`]:
//! file creation fires `file_created` and a rename reported with both paths fires
//! `file_renamed`. A path that shows up through a one-sided rename (moved in from outside
//! the vault, or a backend that reports the two halves separately) counts as created.
//!
//! Renaming or moving in a folder fires one event per file inside it, with each old path
//! rebuilt under the folder's old path. Content changes and removals are not forwarded,
//! and neither is anything under a dot-directory such as `.foldertag` or `.obsidian`.
//!
//! [`VaultTree`]: crate::storage::VaultTree

use std::path::Path;
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::event::{FileCreated, FileRenamed};
use crate::storage::{relative_vault_path, Result, Vault, VaultFile, VaultTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WatchedChange {
    Created(String),
    Renamed { from: String, to: String },
}

/// Maps a raw notification to the vault change it represents, if any.
pub(crate) fn translate(root: &Path, event: &notify::Event) -> Option<WatchedChange> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => None,
        EventKind::Create(_) => {
            let path = event.paths.first()?;
            relative_vault_path(root, path).map(WatchedChange::Created)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let [from, to] = event.paths.as_slice() else {
                return None;
            };
            let from = relative_vault_path(root, from);
            let to = relative_vault_path(root, to);
            match (from, to) {
                (Some(from), Some(to)) => Some(WatchedChange::Renamed { from, to }),
                // Moved in from a hidden or outside location
                (None, Some(to)) => Some(WatchedChange::Created(to)),
                _ => None,
            }
        }
        // Only one side of a rename. Whether it is the new side is decided by checking
        // the path on disk.
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => {
            let path = event.paths.first()?;
            relative_vault_path(root, path).map(WatchedChange::Created)
        }
        _ => None,
    }
}

/// The file at `path`, or every file below it if `path` is a folder. Empty if the path
/// is gone.
async fn files_at(vault: &Vault, path: &str) -> Vec<VaultFile> {
    let meta = match tokio::fs::metadata(vault.path().join(path)).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Skipping {}: {}", path, e);
            return Vec::new();
        }
    };
    if meta.is_file() {
        return vec![VaultFile::new(path)];
    }
    if !meta.is_dir() {
        return Vec::new();
    }

    let prefix = format!("{path}/");
    match vault.list_files().await {
        Ok(files) => files.into_iter().filter(|f| f.path().starts_with(&prefix)).collect(),
        Err(e) => {
            warn!("Failed to list files under {}: {}", path, e);
            Vec::new()
        }
    }
}

/// Dispatches the vault events for one change.
pub(crate) async fn forward(vault: &Vault, change: WatchedChange) {
    match change {
        WatchedChange::Created(path) => {
            for file in files_at(vault, &path).await {
                vault.on.file_created.dispatch(&FileCreated { file });
            }
        }
        WatchedChange::Renamed { from, to } => {
            for file in files_at(vault, &to).await {
                let old_path = format!("{}{}", from, &file.path()[to.len()..]);
                vault.on.file_renamed.dispatch(&FileRenamed { file, old_path });
            }
        }
    }
}

/// A running watch on a vault directory. Dropping it stops the watch.
#[derive(Debug)]
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl VaultWatcher {
    /// Stops watching and waits for pending notifications to be dispatched.
    pub async fn stop(self) {
        let VaultWatcher { _watcher, task } = self;
        drop(_watcher);
        if let Err(e) = task.await {
            error!("Vault watcher task failed: {}", e);
        }
    }
}

/// Starts watching `vault`'s directory recursively. Must be called from within a tokio
/// runtime.
pub fn watch(vault: Arc<Vault>) -> Result<VaultWatcher> {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!("File watcher error: {}", e),
        },
        Config::default(),
    )?;
    watcher.watch(vault.path(), RecursiveMode::Recursive)?;
    info!("Watching {}", vault.path().display());

    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(change) = translate(vault.path(), &event) else {
                continue;
            };
            debug!(?change, "Vault change detected");
            forward(&vault, change).await;
        }
        debug!("Vault watcher stopped");
    });

    Ok(VaultWatcher {
        _watcher: watcher,
        task,
    })
}
