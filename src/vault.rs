//! Document store the scanner and reconciler read from.
//!
//! Paths handed across this boundary are vault-relative and always use `/`
//! as the separator, whatever the host platform.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{extension_of, is_canvas_path, Result, ThumbnailError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultFile {
    pub path: String,
}

impl VaultFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.path)
    }

    pub fn is_canvas(&self) -> bool {
        is_canvas_path(&self.path)
    }
}

#[async_trait]
pub trait Vault: Send + Sync {
    /// Every document in the vault, in a stable order.
    fn list_files(&self) -> Vec<VaultFile>;

    async fn read(&self, path: &str) -> Result<String>;

    fn exists(&self, path: &str) -> bool;

    /// Turn a vault path into a locator usable as a CSS background.
    ///
    /// Only vaults backed by a real file system can do this; everything else
    /// reports [`ThumbnailError::AdapterUnavailable`].
    fn resource_url(&self, path: &str) -> Result<String> {
        Err(ThumbnailError::AdapterUnavailable(path.to_owned()))
    }
}

pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the file system. `None` for paths that could
    /// step outside the root (`.`/`..` segments, backslashes).
    fn absolute(&self, path: &str) -> Option<PathBuf> {
        let mut absolute = self.root.clone();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            absolute.push(segment);
        }
        Some(absolute)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

#[async_trait]
impl Vault for FsVault {
    fn list_files(&self) -> Vec<VaultFile> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.relative(e.path()))
            .map(VaultFile::new)
            .collect()
    }

    async fn read(&self, path: &str) -> Result<String> {
        let absolute = self
            .absolute(path)
            .ok_or_else(|| ThumbnailError::FileNotFound(path.to_owned()))?;
        let content = tokio::fs::read_to_string(absolute).await?;
        Ok(content)
    }

    fn exists(&self, path: &str) -> bool {
        !path.is_empty()
            && self
                .absolute(path)
                .map(|absolute| absolute.is_file())
                .unwrap_or(false)
    }

    fn resource_url(&self, path: &str) -> Result<String> {
        let absolute = self
            .absolute(path)
            .filter(|absolute| !path.is_empty() && absolute.is_file())
            .ok_or_else(|| ThumbnailError::FileNotFound(path.to_owned()))?;
        url::Url::from_file_path(absolute)
            .map(String::from)
            .map_err(|_| ThumbnailError::ResourceResolution(path.to_owned()))
    }
}

/// Vault held entirely in memory. Without a resource base it behaves like a
/// vault whose adapter cannot serve files.
#[derive(Debug, Default, Clone)]
pub struct MemoryVault {
    files: BTreeMap<String, String>,
    resource_base: Option<String>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn with_resource_base(mut self, base: impl Into<String>) -> Self {
        self.resource_base = Some(base.into().trim_end_matches('/').to_owned());
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }
}

#[async_trait]
impl Vault for MemoryVault {
    fn list_files(&self) -> Vec<VaultFile> {
        self.files.keys().cloned().map(VaultFile::new).collect()
    }

    async fn read(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ThumbnailError::FileNotFound(path.to_owned()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn resource_url(&self, path: &str) -> Result<String> {
        let base = self
            .resource_base
            .as_deref()
            .ok_or_else(|| ThumbnailError::AdapterUnavailable(path.to_owned()))?;
        if !self.exists(path) {
            return Err(ThumbnailError::FileNotFound(path.to_owned()));
        }
        Ok(format!("{}/{}", base, path))
    }
}
