use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::vault::{Vault, VaultFile};
use crate::{is_image_path, Result, ThumbnailError};

const READ_CONCURRENCY: usize = 8;
const FILE_NODE_TYPE: &str = "file";

/// The part of the canvas format this crate reads. Everything else in the
/// document (edges, geometry, colours) is ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CanvasNode {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

impl CanvasNode {
    pub fn is_file(&self) -> bool {
        self.kind.as_deref() == Some(FILE_NODE_TYPE)
    }
}

impl CanvasDocument {
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| ThumbnailError::CanvasParse {
            path: path.to_owned(),
            source,
        })
    }

    /// First file node, in list order, that points at an existing image.
    pub fn first_image<V: Vault + ?Sized>(&self, vault: &V) -> Option<&str> {
        self.nodes
            .iter()
            .filter(|node| node.is_file())
            .filter_map(|node| node.file.as_deref())
            .find(|target| is_image_path(target) && vault.exists(target))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanvasThumbnailMap {
    entries: BTreeMap<String, String>,
}

impl CanvasThumbnailMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canvas_path: impl Into<String>, image_path: impl Into<String>) {
        self.entries.insert(canvas_path.into(), image_path.into());
    }

    pub fn get(&self, canvas_path: &str) -> Option<&str> {
        self.entries.get(canvas_path).map(String::as_str)
    }

    pub fn contains(&self, canvas_path: &str) -> bool {
        self.entries.contains_key(canvas_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CanvasThumbnailMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (canvas_path, image_path) in iter {
            map.insert(canvas_path, image_path);
        }
        map
    }
}

/// Build a fresh canvas → image map from every canvas document in `vault`.
///
/// A document that cannot be read or parsed is logged and left out; it never
/// stops the rest of the scan.
pub async fn scan_canvases<V: Vault + ?Sized>(vault: &V) -> CanvasThumbnailMap {
    let canvases: Vec<VaultFile> = vault
        .list_files()
        .into_iter()
        .filter(VaultFile::is_canvas)
        .collect();

    debug!(count = canvases.len(), "scanning canvas documents");

    // `buffered` keeps listing order, so folding below is deterministic.
    let contents: Vec<(VaultFile, Result<String>)> = stream::iter(canvases)
        .map(|file| async move {
            let content = vault.read(&file.path).await;
            (file, content)
        })
        .buffered(READ_CONCURRENCY)
        .collect()
        .await;

    let mut map = CanvasThumbnailMap::new();
    for (file, content) in contents {
        let document = match content.and_then(|c| CanvasDocument::parse(&file.path, &c)) {
            Ok(document) => document,
            Err(e) => {
                warn!(canvas = %file.path, error = %e, "skipping canvas document");
                continue;
            }
        };

        match document.first_image(vault) {
            Some(image) => {
                debug!(canvas = %file.path, image, "found canvas thumbnail");
                map.insert(file.path, image);
            }
            None => debug!(canvas = %file.path, "no image in canvas"),
        }
    }

    info!(canvases = map.len(), "canvas scan complete");
    map
}
