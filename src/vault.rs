//! Filesystem capability the engine reads from and writes to.
//!
//! Paths handed to a [`Vault`] are vault-relative and `/`-separated, the same
//! form the remote repository uses.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Files and folders directly inside a directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// Local file tree operations
pub trait Vault: Send + Sync {
    /// Immediate children of `dir` ("" is the root)
    fn list(&self, dir: &str) -> Result<Listing>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write `data`, creating parent directories
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    fn append(&self, path: &str, data: &[u8]) -> Result<()>;

    fn rename(&self, from: &str, to: &str) -> Result<()>;

    fn remove(&self, path: &str) -> Result<()>;

    fn mkdir(&self, path: &str) -> Result<()>;

    fn exists(&self, path: &str) -> bool;

    fn is_dir(&self, path: &str) -> bool;
}

/// [`Vault`] rooted at a directory on the local disk
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("Path escapes the vault: {path}"),
            }
        }
        Ok(self.root.join(relative))
    }

    fn relative(&self, full: &Path) -> Option<String> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl Vault for LocalVault {
    fn list(&self, dir: &str) -> Result<Listing> {
        let full = self.resolve(dir)?;
        let mut listing = Listing::default();

        for entry in WalkDir::new(&full)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("Failed to list {}", full.display()))?;
            let Some(rel) = self.relative(entry.path()) else {
                continue;
            };
            if entry.file_type().is_dir() {
                listing.folders.push(rel);
            } else if entry.file_type().is_file() {
                listing.files.push(rel);
            }
        }
        Ok(listing)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).with_context(|| format!("Failed to read {}", full.display()))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&full, data).with_context(|| format!("Failed to write {}", full.display()))
    }

    fn append(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .with_context(|| format!("Failed to open {}", full.display()))?;
        file.write_all(data)
            .with_context(|| format!("Failed to append to {}", full.display()))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dst)
            .with_context(|| format!("Failed to rename {} -> {}", src.display(), dst.display()))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        let removed = if full.is_dir() {
            fs::remove_dir_all(&full)
        } else {
            fs::remove_file(&full)
        };
        removed.with_context(|| format!("Failed to remove {}", full.display()))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).with_context(|| format!("Failed to create {}", full.display()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }
}
