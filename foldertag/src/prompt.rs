use anyhow::{Context, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Select};
use foldertag_core::selection::{NewTag, TagSelection};
use foldertag_core::storage::Vault;

// dialoguer blocks on the terminal, so every prompt runs on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task failed (panic)")?;
    result.context("Failed to read input")
}

/// Walks the user through choosing tags: one folder tag, any of the other tags, then any
/// number of new tags. Returns the chosen tags.
pub async fn select_tags(mut selection: TagSelection, vault: &Vault) -> Result<Vec<String>> {
    let folder_tags = selection.catalog().folder_matching().to_vec();
    if !folder_tags.is_empty() {
        let mut items = vec!["(none)".to_string()];
        items.extend(folder_tags.iter().map(|t| format!("#{}", t)));
        let choice = blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Folder tag")
                .items(&items)
                .default(0)
                .interact()
        })
        .await?;
        if let Some(tag) = choice.checked_sub(1).and_then(|i| folder_tags.get(i)) {
            selection.select_folder_tag(tag);
        }
    }

    let other_tags = selection.catalog().other().to_vec();
    if !other_tags.is_empty() {
        let items: Vec<String> = other_tags.iter().map(|t| format!("#{}", t)).collect();
        let chosen = blocking(move || {
            MultiSelect::with_theme(&ColorfulTheme::default())
                .with_prompt("Other tags (space to toggle)")
                .items(&items)
                .interact()
        })
        .await?;
        for idx in chosen {
            selection.set_other_tag(&other_tags[idx], true);
        }
    }

    loop {
        let input: String = blocking(|| {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("New tag (empty to finish)")
                .allow_empty(true)
                .interact_text()
        })
        .await?;
        if input.trim().is_empty() {
            break;
        }
        let create_folder = blocking(|| {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Also create a folder for this tag?")
                .default(false)
                .interact()
        })
        .await?;

        match selection.add_new_tag(&input, create_folder, vault).await {
            Ok(NewTag::Added(tag)) => println!("  Added {}", style(format!("#{}", tag)).cyan()),
            Ok(NewTag::CreatedFolder(tag)) => {
                println!("  Created tag {} and folder {}", style(format!("#{}", tag)).cyan(), tag)
            }
            Ok(NewTag::Ignored) => println!("  {}", style("Tag already listed, ignored").dim()),
            Err(e) => eprintln!("  {} {}", style("Tag not added:").red(), e),
        }
    }

    Ok(selection.submit())
}
