//! Keeps each note's folder tag in step with the folder it lives in.
//!
//! A file's *folder tag* is the name of its immediate parent folder: `Inbox/todo.md`
//! carries `Inbox`, `Projects/X/notes.md` carries `X`, and files at the vault root carry
//! none. When a file is created its folder tag is added to the `tags:` list in its
//! frontmatter; when it moves to another folder the old folder tag is removed and the new
//! one added. Files whose extension is excluded in [`Settings`] (PDFs by default) are
//! never touched.
//!
//! Every change is a fresh read-modify-write against [`Storage`]; nothing is cached.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::Settings;
use crate::event::{FileCreated, FileOpened, FileRenamed, Listener, VaultEvents};
use crate::frontmatter;
use crate::storage::{folder_name, normalize_path, Error, Result, Storage, VaultFile, VaultTree};

/// The folder tag for a vault path: the second-to-last segment, or `None` for files at
/// the vault root.
pub fn derive_folder_tag(path: &str) -> Option<&str> {
    let mut segments = path.rsplit('/');
    segments.next();
    segments.next()
}

/// Result of the manual "add folder tag" command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveFileOutcome {
    /// The tag was added.
    Tagged(String),
    /// The file already carried the tag.
    AlreadyTagged(String),
    /// The file is at the vault root.
    NoFolder,
    /// The file's extension is excluded from tagging.
    Excluded,
}

/// Counts from tagging every file in a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderTagReport {
    pub processed: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct FolderTagSynchronizer<S: Storage + ?Sized> {
    storage: Arc<S>,
    settings: Settings,
}

impl<S: Storage + ?Sized> FolderTagSynchronizer<S> {
    pub fn new(storage: Arc<S>, settings: Settings) -> Self {
        FolderTagSynchronizer { storage, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tags a newly created file with its folder tag.
    #[instrument(skip(self, file), fields(file = %file))]
    pub async fn on_file_created(&self, file: &VaultFile) -> Result<()> {
        if self.settings.is_excluded(file) {
            debug!("Skipping excluded file");
            return Ok(());
        }
        if let Some(tag) = derive_folder_tag(file.path()) {
            self.add_tag(file, tag).await?;
        }
        Ok(())
    }

    /// Replaces the folder tag of a file that moved from `old_path`.
    #[instrument(skip(self, file), fields(file = %file))]
    pub async fn on_file_renamed(&self, file: &VaultFile, old_path: &str) -> Result<()> {
        if self.settings.is_excluded(file) {
            debug!("Skipping excluded file");
            return Ok(());
        }
        let old_tag = derive_folder_tag(old_path);
        let new_tag = derive_folder_tag(file.path());

        if let Some(old_tag) = old_tag {
            if Some(old_tag) != new_tag {
                self.remove_tag(file, old_tag).await?;
            }
        }
        // Same-folder renames still go through here; the add is a no-op then
        if let Some(new_tag) = new_tag {
            self.add_tag(file, new_tag).await?;
        }
        Ok(())
    }

    /// Logs details about the file that became active.
    pub fn on_file_opened(&self, file: &VaultFile) {
        debug!(
            file_name = file.name(),
            file_path = file.path(),
            folder_name = file.parent_name().unwrap_or(""),
            folder_path = file.parent().unwrap_or(""),
            "File opened"
        );
    }

    /// Adds `tag` to the file's frontmatter tag list unless it is already listed.
    /// Returns whether the file was written.
    #[instrument(skip(self, file), fields(file = %file))]
    pub async fn add_tag(&self, file: &VaultFile, tag: &str) -> Result<bool> {
        self.add_tags(file, &[tag]).await
    }

    /// Adds every tag not listed yet, in a single write. Returns whether the file was
    /// written. Fails without reading the file if any tag is invalid.
    pub async fn add_tags<T: AsRef<str> + Sync>(&self, file: &VaultFile, tags: &[T]) -> Result<bool> {
        if let Some(bad) = tags.iter().map(AsRef::as_ref).find(|t| !frontmatter::is_valid_tag(t)) {
            return Err(Error::InvalidTag(bad.to_string()));
        }
        let content = self.storage.read(file).await?;
        match frontmatter::add_tags(&content, tags) {
            Some(updated) => {
                self.storage.modify(file, &updated).await?;
                debug!("Tags added");
                Ok(true)
            }
            None => {
                debug!("Tags already present");
                Ok(false)
            }
        }
    }

    /// Removes the first occurrence of `tag` from the file's tag list. Nothing is written
    /// if the tag isn't listed. Returns whether the file was written.
    #[instrument(skip(self, file), fields(file = %file))]
    pub async fn remove_tag(&self, file: &VaultFile, tag: &str) -> Result<bool> {
        let content = self.storage.read(file).await?;
        match frontmatter::remove_tag(&content, tag) {
            Some(updated) => {
                self.storage.modify(file, &updated).await?;
                debug!("Tag removed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Manual entry point: tags the active file with its folder tag.
    #[instrument(skip(self, file), fields(file = %file))]
    pub async fn add_folder_tag_to_active_file(&self, file: &VaultFile) -> Result<ActiveFileOutcome> {
        if self.settings.is_excluded(file) {
            return Ok(ActiveFileOutcome::Excluded);
        }
        let Some(tag) = derive_folder_tag(file.path()) else {
            return Ok(ActiveFileOutcome::NoFolder);
        };
        if self.add_tag(file, tag).await? {
            info!("Added folder tag #{} to {}", tag, file);
            Ok(ActiveFileOutcome::Tagged(tag.to_string()))
        } else {
            Ok(ActiveFileOutcome::AlreadyTagged(tag.to_string()))
        }
    }
}

impl<S: VaultTree + ?Sized> FolderTagSynchronizer<S> {
    /// Tags every file directly inside `folder` with the folder's name. Files that can't
    /// be tagged are logged and left out of the report.
    #[instrument(skip(self))]
    pub async fn add_folder_tag_to_folder(&self, folder: &str) -> Result<FolderTagReport> {
        let folder = normalize_path(folder)?;
        let tag = folder_name(&folder);
        let mut report = FolderTagReport::default();

        for file in self.storage.list_files().await? {
            if file.parent() != Some(folder.as_str()) {
                continue;
            }
            if self.settings.is_excluded(&file) {
                report.skipped += 1;
                continue;
            }
            match self.add_tag(&file, tag).await {
                Ok(true) => report.processed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => error!(file = %file, "Failed to tag file: {}", e),
            }
        }
        info!(processed = report.processed, skipped = report.skipped, "Folder tagged");
        Ok(report)
    }
}

enum Queued {
    Created(VaultFile),
    Renamed { file: VaultFile, old_path: String },
    Opened(VaultFile),
    Flush(oneshot::Sender<()>),
}

/// A running subscription of a synchronizer to vault events.
#[derive(Debug)]
pub struct SyncHandle {
    listeners: (Listener<FileCreated>, Listener<FileRenamed>, Listener<FileOpened>),
    flush_tx: mpsc::UnboundedSender<Queued>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for Queued {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Queued::Created(file) => f.debug_tuple("Created").field(file).finish(),
            Queued::Renamed { file, old_path } => f
                .debug_struct("Renamed")
                .field("file", file)
                .field("old_path", old_path)
                .finish(),
            Queued::Opened(file) => f.debug_tuple("Opened").field(file).finish(),
            Queued::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl<S: Storage + ?Sized + 'static> FolderTagSynchronizer<S> {
    /// Starts reacting to `events`. Events are queued as they are dispatched and handled
    /// one at a time, in order, on a spawned task. Handler errors are logged.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(self: &Arc<Self>, events: &VaultEvents) -> SyncHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();

        let created_tx = tx.clone();
        let on_created = Listener::new(&events.file_created, move |e: &FileCreated| {
            let _ = created_tx.send(Queued::Created(e.file.clone()));
        });
        let renamed_tx = tx.clone();
        let on_renamed = Listener::new(&events.file_renamed, move |e: &FileRenamed| {
            let _ = renamed_tx.send(Queued::Renamed {
                file: e.file.clone(),
                old_path: e.old_path.clone(),
            });
        });
        let opened_tx = tx.clone();
        let on_opened = Listener::new(&events.file_opened, move |e: &FileOpened| {
            let _ = opened_tx.send(Queued::Opened(e.file.clone()));
        });

        let sync = Arc::clone(self);
        let worker = tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let result = match &queued {
                    Queued::Created(file) if sync.settings.sync_on_create => sync.on_file_created(file).await,
                    Queued::Renamed { file, old_path } if sync.settings.sync_on_rename => {
                        sync.on_file_renamed(file, old_path).await
                    }
                    Queued::Opened(file) => {
                        sync.on_file_opened(file);
                        Ok(())
                    }
                    Queued::Flush(_) => Ok(()),
                    _ => {
                        debug!(event = ?queued, "Automatic sync disabled, ignoring event");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    error!(event = ?queued, "Failed to sync folder tag: {}", e);
                }
                if let Queued::Flush(done) = queued {
                    let _ = done.send(());
                }
            }
            debug!("Folder tag sync stopped");
        });

        SyncHandle {
            listeners: (on_created, on_renamed, on_opened),
            flush_tx: tx,
            worker,
        }
    }
}

impl SyncHandle {
    /// Waits until every event dispatched so far has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.flush_tx.send(Queued::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Unregisters from the vault events and waits for queued events to be handled.
    pub async fn shutdown(self) {
        let SyncHandle { listeners, flush_tx, worker } = self;
        // Dropping the listeners and the sender closes the channel
        drop(listeners);
        drop(flush_tx);
        if let Err(e) = worker.await {
            error!("Folder tag sync task failed: {}", e);
        }
    }
}
