//! Repository download handler

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{Confirm, Select};

use crate::remote::{GitLabClient, TreeEntry};
use crate::sync::{SyncEngine, VAULT_CONFIG_DIR};

use super::is_interactive;

const DOWNLOAD_HERE: &str = "[download this folder]";
const UP: &str = "..";

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Folders directly below `dir` ("" is the root) in a recursive listing
pub fn child_folders(tree: &[TreeEntry], dir: &str) -> Vec<String> {
    tree.iter()
        .filter(|e| e.is_dir && parent_of(&e.path) == dir)
        .map(|e| e.path.clone())
        .collect()
}

/// Walk the remote folders until the user picks one
fn choose_tree_path(client: &GitLabClient) -> Result<String> {
    let tree = client
        .read_repo_tree("", false)
        .context("Failed to list repository")?;
    let mut current = String::new();

    loop {
        let folders = child_folders(&tree, &current);
        if folders.is_empty() {
            return Ok(current);
        }

        let mut options = vec![DOWNLOAD_HERE.to_string()];
        if !current.is_empty() {
            options.push(UP.to_string());
        }
        options.extend(folders);

        let message = format!(
            "Repository folder ({}):",
            if current.is_empty() { "/" } else { &current }
        );
        let picked = Select::new(&message, options)
            .with_help_message("Enter descends into a folder")
            .prompt()
            .context("Failed to get folder selection")?;

        if picked == DOWNLOAD_HERE {
            return Ok(current);
        }
        current = if picked == UP {
            parent_of(&current).to_string()
        } else {
            picked
        };
    }
}

/// Handle download command
///
/// Missing choices are prompted for on a terminal; otherwise the whole
/// repository is downloaded including the editor configuration folder.
pub fn handle_download(
    engine: &SyncEngine,
    path: Option<String>,
    skip_config_dir: Option<bool>,
) -> Result<()> {
    let interactive = is_interactive();

    let path = match path {
        Some(path) => path.trim_matches('/').to_string(),
        None if interactive => choose_tree_path(engine.client())?,
        None => String::new(),
    };

    let skip_config_dir = match skip_config_dir {
        Some(skip) => skip,
        None if interactive => !Confirm::new(&format!("Include {VAULT_CONFIG_DIR}?"))
            .with_default(true)
            .prompt()
            .context("Failed to get confirmation")?,
        None => false,
    };

    let shown = if path.is_empty() { "/" } else { path.as_str() };
    println!("{} {}...", "Downloading".cyan(), shown);

    engine.download_repository(&path, skip_config_dir)?;
    engine.wait_idle();

    println!("{}", "✓ Download finished".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(path: &str) -> TreeEntry {
        TreeEntry {
            id: String::new(),
            path: path.into(),
            is_dir: true,
        }
    }

    #[test]
    fn test_child_folders() {
        let tree = vec![
            dir("notes"),
            dir("notes/daily"),
            dir("notes/daily/2024"),
            dir("archive"),
            TreeEntry {
                id: String::new(),
                path: "notes/a.md".into(),
                is_dir: false,
            },
        ];
        assert_eq!(child_folders(&tree, ""), vec!["notes", "archive"]);
        assert_eq!(child_folders(&tree, "notes"), vec!["notes/daily"]);
        assert!(child_folders(&tree, "archive").is_empty());
    }
}
