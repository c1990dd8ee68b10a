use clap::Parser;
use std::path::PathBuf;

pub mod dom;
pub mod panel;
pub mod plugin;
pub mod reconciler;
pub mod runtime;
pub mod scanner;
pub mod scheduler;
pub mod settings;
pub mod vault;
pub mod watcher;

pub use dom::{MutationRecord, NodeId, ObserverId, UiTree};
pub use panel::{RefreshButton, SettingRow, SettingsPanel, REFRESH_BUSY_LABEL, REFRESH_IDLE_LABEL};
pub use plugin::ThumbnailPlugin;
pub use reconciler::{
    clear_thumbnail, clear_thumbnails, comparison_key, find_card, reconcile, CardOutcome,
    CARDS_CONTAINER_CLASS, CARD_CLASS, CARD_COVER_CLASS, CARD_FILE_NAME_CLASS,
    PREVIOUS_STYLE_ATTR, THUMBNAIL_IMAGE_ATTR, THUMBNAIL_MARKER_ATTR,
};
pub use runtime::{run, PluginEvent};
pub use scanner::{scan_canvases, CanvasDocument, CanvasNode, CanvasThumbnailMap};
pub use scheduler::{
    ScheduledAction, UpdateScheduler, CANVAS_DEBOUNCE, DECORATE_DELAY, LAYOUT_DEBOUNCE,
};
pub use settings::{
    load_settings, save_settings, ExtraMargin, JsonFileStore, MemoryStore, SettingsStore,
    ThumbnailSettings,
};
pub use vault::{FsVault, MemoryVault, Vault, VaultFile};
pub use watcher::{MutationWatcher, WORKSPACE_CLASS};

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse canvas {path}: {source}")]
    CanvasParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("File not found in vault: {0}")]
    FileNotFound(String),

    #[error("No file system adapter available to resolve {0}")]
    AdapterUnavailable(String),

    #[error("Failed to resolve resource URL for {0}")]
    ResourceResolution(String),

    #[error("Failed to persist settings: {0}")]
    SettingsPersistence(String),
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "svg", "gif", "ico"];
pub const CANVAS_EXTENSION: &str = "canvas";

#[derive(Parser, Clone, Debug)]
#[command(name = "canvas-thumbnails")]
#[command(about = "Map canvas documents in a vault to the first image they embed")]
pub struct Args {
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    #[arg(short, long, help = "Settings file (defaults to the user config directory)")]
    pub settings_file: Option<PathBuf>,

    #[arg(long, help = "Enable debug output")]
    pub debug: bool,

    #[arg(long, help = "Print the current settings and exit")]
    pub show_settings: bool,

    #[arg(long, value_name = "BOOL", help = "Persist a new value for real-time updates")]
    pub real_time_update: Option<bool>,

    #[arg(long, help = "Print the thumbnail map as JSON")]
    pub json: bool,
}

impl Args {
    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(settings::default_settings_path)
    }
}

pub(crate) fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(index) => Some(&name[index + 1..]),
    }
}

/// Case-insensitive check against [`IMAGE_EXTENSIONS`] for a vault-relative path.
pub fn is_image_path(path: &str) -> bool {
    extension_of(path)
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|&valid_ext| valid_ext.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

pub fn is_canvas_path(path: &str) -> bool {
    extension_of(path) == Some(CANVAS_EXTENSION)
}
