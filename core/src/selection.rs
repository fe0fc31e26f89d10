//! Choosing tags for a note and filing it into the matching folder.
//!
//! A [`TagCatalog`] lists every tag used in a vault, split into tags that name a folder
//! and all others. A [`TagSelection`] tracks the user's choice over a catalog: at most one
//! folder tag, any number of other tags, and new tags typed in by hand. [`apply_tags`]
//! writes the chosen tags into a file and moves it into the folder named by one of them.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::frontmatter::{self, Note};
use crate::storage::{folder_name, Error, Result, VaultFile, VaultTree};

static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\p{L}_][\p{L}\p{N}_/-]*)").unwrap());

/// Every tag in a note: its frontmatter tags followed by inline `#tags` in the body.
/// Hashtags inside code spans and code blocks don't count. Duplicates are removed.
pub fn collect_tags(content: &str) -> Vec<String> {
    let note = Note::parse(content);
    let mut tags = note.tags();

    let mut in_code_block = false;
    let parser = TextMergeStream::new(Parser::new_ext(note.body(), Options::ENABLE_GFM));
    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(text) if !in_code_block => {
                for cap in INLINE_TAG_RE.captures_iter(&text) {
                    tags.push(cap[1].to_string());
                }
            }
            _ => {}
        }
    }

    let mut seen = BTreeSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));
    tags
}

/// The tags in use across a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagCatalog {
    folder_matching: Vec<String>,
    other: Vec<String>,
    folder_names: BTreeSet<String>,
}

impl TagCatalog {
    /// Scans every markdown file in `vault`. Files that can't be read are skipped.
    #[instrument(skip(vault))]
    pub async fn build<V: VaultTree + ?Sized>(vault: &V) -> Result<TagCatalog> {
        let mut tags = BTreeSet::new();
        for file in vault.list_files().await? {
            if !file.extension().eq_ignore_ascii_case("md") {
                continue;
            }
            match vault.read(&file).await {
                Ok(content) => tags.extend(collect_tags(&content)),
                Err(e) => warn!(file = %file, "Skipping unreadable file: {}", e),
            }
        }
        let folders = vault.list_folders().await?;
        let names = folders.iter().map(|f| folder_name(f).to_string());

        let catalog = TagCatalog::from_parts(tags, names);
        debug!(
            folder_matching = catalog.folder_matching.len(),
            other = catalog.other.len(),
            "Tag catalog built"
        );
        Ok(catalog)
    }

    pub fn from_parts(
        tags: impl IntoIterator<Item = String>,
        folder_names: impl IntoIterator<Item = String>,
    ) -> TagCatalog {
        let folder_names: BTreeSet<String> = folder_names.into_iter().collect();
        let tags: BTreeSet<String> = tags.into_iter().collect();
        let (folder_matching, other) = tags.into_iter().partition(|t| folder_names.contains(t));
        TagCatalog {
            folder_matching,
            other,
            folder_names,
        }
    }

    /// Tags that are also the name of some folder, sorted.
    pub fn folder_matching(&self) -> &[String] {
        &self.folder_matching
    }

    /// All remaining tags, sorted.
    pub fn other(&self) -> &[String] {
        &self.other
    }

    pub fn is_folder_name(&self, name: &str) -> bool {
        self.folder_names.contains(name)
    }

    fn add_folder_tag(&mut self, tag: &str) {
        self.folder_names.insert(tag.to_string());
        if let Err(idx) = self.folder_matching.binary_search_by(|t| t.as_str().cmp(tag)) {
            self.folder_matching.insert(idx, tag.to_string());
        }
    }
}

/// What [`TagSelection::add_new_tag`] did with its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewTag {
    /// Blank, already selected, or already a folder tag.
    Ignored,
    /// Appended to the selected tags.
    Added(String),
    /// A folder was created and the tag selected as the folder tag.
    CreatedFolder(String),
}

#[derive(Debug, Clone)]
pub struct TagSelection {
    catalog: TagCatalog,
    folder_tag: Option<String>,
    other_tags: Vec<String>,
}

impl TagSelection {
    pub fn new(catalog: TagCatalog) -> Self {
        TagSelection {
            catalog,
            folder_tag: None,
            other_tags: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn folder_tag(&self) -> Option<&str> {
        self.folder_tag.as_deref()
    }

    pub fn other_tags(&self) -> &[String] {
        &self.other_tags
    }

    /// Selects `tag` as the folder tag, replacing any previous choice. Returns `false` and
    /// leaves the selection alone if `tag` is not a folder-matching tag.
    pub fn select_folder_tag(&mut self, tag: &str) -> bool {
        if !self.catalog.folder_matching.iter().any(|t| t == tag) {
            return false;
        }
        self.folder_tag = Some(tag.to_string());
        true
    }

    /// Checks or unchecks one of the other tags.
    pub fn set_other_tag(&mut self, tag: &str, selected: bool) {
        let pos = self.other_tags.iter().position(|t| t == tag);
        match (selected, pos) {
            (true, None) => self.other_tags.push(tag.to_string()),
            (false, Some(idx)) => {
                self.other_tags.remove(idx);
            }
            _ => {}
        }
    }

    /// Adds a tag typed by the user. One leading `#` is dropped. With `create_folder`, a
    /// folder of that name is created at the vault root and the tag becomes the folder tag.
    ///
    /// Tags containing `,`, `[` or `]` are rejected with [`Error::InvalidTag`].
    pub async fn add_new_tag<V: VaultTree + ?Sized>(
        &mut self,
        input: &str,
        create_folder: bool,
        vault: &V,
    ) -> Result<NewTag> {
        let trimmed = input.trim();
        let tag = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if tag.is_empty()
            || self.other_tags.iter().any(|t| t == tag)
            || self.catalog.folder_matching.iter().any(|t| t == tag)
        {
            return Ok(NewTag::Ignored);
        }
        if !frontmatter::is_valid_tag(tag) {
            return Err(Error::InvalidTag(tag.to_string()));
        }

        if create_folder {
            vault.create_folder(tag).await?;
            info!("Created folder {} for tag #{}", tag, tag);
            self.catalog.add_folder_tag(tag);
            self.folder_tag = Some(tag.to_string());
            Ok(NewTag::CreatedFolder(tag.to_string()))
        } else {
            self.other_tags.push(tag.to_string());
            Ok(NewTag::Added(tag.to_string()))
        }
    }

    /// The chosen tags: the folder tag first, then the other tags in selection order.
    pub fn submit(self) -> Vec<String> {
        self.folder_tag
            .into_iter()
            .chain(self.other_tags)
            .filter(|t| !t.trim().is_empty())
            .collect()
    }
}

/// Adds `tags` plus the file's current folder name to `file`, then moves the file into
/// the folder named by the first tag that isn't its current folder's name. Returns the
/// file at its final location.
///
/// Unlike automatic sync, this writes to files of every extension. Invalid tags are
/// dropped with a warning.
#[instrument(skip(vault, file), fields(file = %file))]
pub async fn apply_tags<V: VaultTree + ?Sized>(vault: &V, file: &VaultFile, tags: &[String]) -> Result<VaultFile> {
    let mut seen = BTreeSet::new();
    let mut valid: Vec<&str> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(*t))
        .filter(|t| {
            let valid = frontmatter::is_valid_tag(t);
            if !valid {
                warn!("Dropping invalid tag: {}", t);
            }
            valid
        })
        .collect();
    let parent_name = file.parent_name();
    if let Some(parent) = parent_name {
        if !valid.contains(&parent) {
            valid.push(parent);
        }
    }
    if valid.is_empty() {
        return Ok(file.clone());
    }

    let content = vault.read(file).await?;
    if let Some(updated) = frontmatter::add_tags(&content, &valid) {
        vault.modify(file, &updated).await?;
    }
    info!("Added tags {}", valid.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(", "));

    let folders = vault.list_folders().await?;
    for tag in valid.iter().filter(|t| Some(**t) != parent_name) {
        let Some(target) = folders.iter().find(|f| folder_name(f) == *tag) else {
            debug!("No folder found matching tag: {}", tag);
            continue;
        };
        let moved = vault.rename_file(file, &format!("{}/{}", target, file.name())).await?;
        info!("Moved {} to folder {}", file, target);
        return Ok(moved);
    }
    Ok(file.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::storage::{MemoryVault, Storage};
    use crate::sync::FolderTagSynchronizer;

    #[test]
    fn test_collect_tags() {
        let content = "---\ntags: [Inbox, work]\n---\n# Heading\n\nSome #idea and #work again.\n\n`#not-a-tag` and\n\n```\n#also-not\n```\nissue#42 #日本語\n";
        assert_eq!(collect_tags(content), vec!["Inbox", "work", "idea", "日本語"]);
    }

    #[test]
    fn test_collect_tags_without_frontmatter() {
        assert_eq!(collect_tags("#first line\nthen #nested/tag"), vec!["first", "nested/tag"]);
        assert!(collect_tags("# Just a heading").is_empty());
    }

    #[tokio::test]
    async fn test_catalog_splits_folder_tags() {
        let vault = MemoryVault::new()
            .with_file("Inbox/a.md", "---\ntags: [Inbox, urgent]\n---\n")
            .with_file("Projects/X/b.md", "Talk about #X and #later")
            .with_file("Projects/scan.pdf", "#pdf-only")
            .with_folder("Empty");

        let catalog = TagCatalog::build(&vault).await.unwrap();
        assert_eq!(catalog.folder_matching(), ["Inbox", "X"]);
        assert_eq!(catalog.other(), ["later", "urgent"]);
        assert!(catalog.is_folder_name("Empty"));
    }

    #[test]
    fn test_selection_radio_and_checkboxes() {
        let catalog = TagCatalog::from_parts(
            ["A", "B", "x", "y"].map(String::from),
            ["A", "B"].map(String::from),
        );
        let mut selection = TagSelection::new(catalog);

        assert!(selection.select_folder_tag("A"));
        assert!(selection.select_folder_tag("B"));
        assert!(!selection.select_folder_tag("x"));
        assert_eq!(selection.folder_tag(), Some("B"));

        selection.set_other_tag("y", true);
        selection.set_other_tag("x", true);
        selection.set_other_tag("y", false);
        selection.set_other_tag("x", true);
        assert_eq!(selection.submit(), vec!["B", "x"]);
    }

    #[tokio::test]
    async fn test_add_new_tag() {
        let vault = MemoryVault::new().with_file("A/n.md", "");
        let catalog = TagCatalog::from_parts(["A".to_string()], ["A".to_string()]);
        let mut selection = TagSelection::new(catalog);

        assert_eq!(selection.add_new_tag("  ", false, &vault).await.unwrap(), NewTag::Ignored);
        assert_eq!(selection.add_new_tag("#A", false, &vault).await.unwrap(), NewTag::Ignored);
        assert_eq!(
            selection.add_new_tag(" #idea ", false, &vault).await.unwrap(),
            NewTag::Added("idea".to_string())
        );
        assert_eq!(selection.add_new_tag("idea", true, &vault).await.unwrap(), NewTag::Ignored);

        let created = selection.add_new_tag("Reading", true, &vault).await.unwrap();
        assert_eq!(created, NewTag::CreatedFolder("Reading".to_string()));
        assert_eq!(selection.catalog().folder_matching(), ["A", "Reading"]);
        assert!(vault.list_folders().await.unwrap().contains(&"Reading".to_string()));
        assert_eq!(selection.submit(), vec!["Reading", "idea"]);
    }

    #[tokio::test]
    async fn test_add_new_tag_rejects_list_punctuation() {
        let vault = MemoryVault::new();
        let mut selection = TagSelection::new(TagCatalog::default());

        for input in ["a,b", "#a,b", "[x]"] {
            let result = selection.add_new_tag(input, false, &vault).await;
            assert!(matches!(result, Err(Error::InvalidTag(_))));
        }
        let result = selection.add_new_tag("a,b", true, &vault).await;
        assert!(matches!(result, Err(Error::InvalidTag(_))));
        assert!(vault.list_folders().await.unwrap().is_empty());
        assert!(selection.submit().is_empty());
    }

    #[tokio::test]
    async fn test_add_new_tag_folder_failure() {
        let vault = MemoryVault::new().with_folder("Reading");
        let mut selection = TagSelection::new(TagCatalog::default());

        let result = selection.add_new_tag("Reading", true, &vault).await;
        assert!(matches!(result, Err(Error::FolderExists(_))));
        assert_eq!(selection.folder_tag(), None);
        assert!(selection.submit().is_empty());
    }

    #[tokio::test]
    async fn test_apply_tags_moves_file() {
        let vault = MemoryVault::new().with_file("Inbox/n.md", "body").with_folder("Areas/Reading");
        let file = VaultFile::new("Inbox/n.md");

        let tags = vec!["Reading".to_string(), "idea".to_string(), "idea".to_string(), " ".to_string()];
        let moved = apply_tags(&vault, &file, &tags).await.unwrap();

        assert_eq!(moved.path(), "Areas/Reading/n.md");
        assert_eq!(
            vault.content("Areas/Reading/n.md").unwrap(),
            "---\ntags: [Reading, idea, Inbox]\n---\nbody"
        );
        assert_eq!(vault.content("Inbox/n.md"), None);
    }

    #[tokio::test]
    async fn test_apply_tags_stays_without_matching_folder() {
        let vault = MemoryVault::new().with_file("Inbox/n.md", "");
        let file = VaultFile::new("Inbox/n.md");

        let result = apply_tags(&vault, &file, &["idea".to_string()]).await.unwrap();
        assert_eq!(result, file);
        assert_eq!(Note::parse(&vault.content("Inbox/n.md").unwrap()).tags(), vec!["idea", "Inbox"]);
    }

    #[tokio::test]
    async fn test_apply_tags_ignores_current_folder_name() {
        let vault = MemoryVault::new()
            .with_file("A/X/n.md", "")
            .with_folder("B/X");
        let file = VaultFile::new("A/X/n.md");

        let result = apply_tags(&vault, &file, &["X".to_string()]).await.unwrap();
        assert_eq!(result.path(), "A/X/n.md");
    }

    #[tokio::test]
    async fn test_apply_tags_writes_excluded_files() {
        let vault = MemoryVault::new().with_file("Inbox/r.pdf", "text").with_folder("Reading");
        let file = VaultFile::new("Inbox/r.pdf");

        let moved = apply_tags(&vault, &file, &["Reading".to_string(), "idea".to_string()])
            .await
            .unwrap();
        assert_eq!(moved.path(), "Reading/r.pdf");
        assert_eq!(
            vault.content("Reading/r.pdf").unwrap(),
            "---\ntags: [Reading, idea, Inbox]\n---\ntext"
        );
    }

    #[tokio::test]
    async fn test_apply_tags_drops_invalid_tags() {
        let vault = MemoryVault::new().with_file("Inbox/n.md", "");
        let file = VaultFile::new("Inbox/n.md");
        let tags = vec!["a,b".to_string(), "idea".to_string()];

        apply_tags(&vault, &file, &tags).await.unwrap();
        apply_tags(&vault, &file, &tags).await.unwrap();
        assert_eq!(Note::parse(&vault.content("Inbox/n.md").unwrap()).tags(), vec!["idea", "Inbox"]);
        assert_eq!(vault.write_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_tags_with_subscribed_sync() {
        let vault = Arc::new(MemoryVault::new().with_file("Inbox/n.md", "").with_folder("Reading"));
        let sync = Arc::new(FolderTagSynchronizer::new(vault.clone(), Settings::default()));
        let handle = sync.subscribe(&vault.on);

        let moved = apply_tags(&*vault, &VaultFile::new("Inbox/n.md"), &["Reading".to_string()])
            .await
            .unwrap();
        handle.shutdown().await;

        let content = vault.read(&moved).await.unwrap();
        assert_eq!(Note::parse(&content).tags(), vec!["Reading"]);
    }
}
