use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// foldertag: Tag markdown notes with the folder they live in.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the default vault path detection.
    #[arg(long, global = true, env = "FOLDERTAG_VAULT")]
    pub vault: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a vault at the specified path. Defaults to the current directory.
    Init {
        path: Option<PathBuf>,
    },
    /// Add the parent folder's name as a tag to a file.
    Tag(TagArgs),
    /// Add a folder's name as a tag to every file directly inside it.
    TagFolder(TagFolderArgs),
    /// Create a new file. It is tagged with its folder automatically.
    New(NewArgs),
    /// Move or rename a file, updating its folder tag.
    Mv(MvArgs),
    /// Choose tags for a file and move it into the matching folder.
    Select(SelectArgs),
    /// List the tags used in the vault.
    Tags {},
    /// List all folders in the vault.
    Folders {},
    /// Watch the vault directory and sync folder tags as files appear or move.
    Watch {},
    /// Manage vault settings.
    Config(ConfigArgs),
}

// --- Argument Structs for each Subcommand ---

#[derive(Args, Debug)]
pub struct TagArgs {
    /// The file to tag: a path on disk, or a path relative to the vault root.
    #[arg(required = true)]
    pub file: String,
}

#[derive(Args, Debug)]
pub struct TagFolderArgs {
    /// The folder: a path on disk, or a path relative to the vault root.
    #[arg(required = true)]
    pub folder: String,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Path of the new file, relative to the vault root.
    #[arg(required = true)]
    pub path: String,

    /// Initial content of the file.
    #[arg(long, short)]
    pub content: Option<String>,

    /// Choose additional tags interactively once the file is created.
    #[arg(long, short)]
    pub select: bool,
}

#[derive(Args, Debug)]
pub struct MvArgs {
    /// The file to move: a path on disk, or a path relative to the vault root.
    pub from: String,
    /// New path, relative to the vault root.
    pub to: String,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// The file to tag: a path on disk, or a path relative to the vault root.
    #[arg(required = true)]
    pub file: String,

    /// Select a tag (repeatable). Tags not used anywhere yet are added as new tags.
    #[arg(long = "tag", short)]
    pub tags: Vec<String>,

    /// Select a folder-matching tag. The file is moved into that folder.
    #[arg(long)]
    pub folder_tag: Option<String>,

    /// Create a folder at the vault root and use its name as the folder tag.
    #[arg(long, conflicts_with = "folder_tag")]
    pub create_folder: Option<String>,
}

impl SelectArgs {
    /// Whether the selection was given on the command line.
    pub fn has_selection(&self) -> bool {
        !self.tags.is_empty() || self.folder_tag.is_some() || self.create_folder.is_some()
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Get the value of a setting.
    Get {
        /// The setting (e.g., `excluded_extensions`, `sync_on_create`).
        key: String,
    },
    /// Set a setting to a value.
    Set {
        /// The setting (e.g., `excluded_extensions`, `sync_on_create`).
        key: String,
        /// The value to set. Lists are comma-separated.
        value: String,
    },
    /// List all settings and their values.
    List {},
    /// Show the location of the vault's config file.
    Locate {},
}
