use crate::plugin::ThumbnailPlugin;
use crate::settings::{SettingsStore, ThumbnailSettings};
use crate::vault::Vault;
use crate::Result;
use tokio::sync::watch;
use tracing::debug;

pub const REFRESH_IDLE_LABEL: &str = "Refresh thumbnails";
pub const REFRESH_BUSY_LABEL: &str = "Refreshing...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRow {
    pub name: &'static str,
    pub description: &'static str,
    pub value: String,
}

/// Refresh button whose label is published on a watch channel, so other
/// parts of the UI can see it flip while a refresh runs.
#[derive(Debug)]
pub struct RefreshButton {
    label: watch::Sender<&'static str>,
}

impl Default for RefreshButton {
    fn default() -> Self {
        let (label, _) = watch::channel(REFRESH_IDLE_LABEL);
        Self { label }
    }
}

impl RefreshButton {
    pub fn label(&self) -> &'static str {
        *self.label.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.label() == REFRESH_BUSY_LABEL
    }

    /// Receiver that observes every label change.
    pub fn subscribe(&self) -> watch::Receiver<&'static str> {
        self.label.subscribe()
    }

    /// Rescan and redecorate immediately. The label reads
    /// [`REFRESH_BUSY_LABEL`] until the refresh finishes.
    pub async fn press<V: Vault, S: SettingsStore>(
        &self,
        plugin: &mut ThumbnailPlugin<V, S>,
    ) -> usize {
        self.label.send_replace(REFRESH_BUSY_LABEL);
        let updated = plugin.refresh().await;
        self.label.send_replace(REFRESH_IDLE_LABEL);
        debug!(updated, "manual refresh finished");
        updated
    }
}

#[derive(Debug, Default)]
pub struct SettingsPanel {
    pub refresh: RefreshButton,
}

impl SettingsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(settings: &ThumbnailSettings) -> Vec<SettingRow> {
        vec![
            SettingRow {
                name: "Thumbnail size",
                description: "Width and height of the card thumbnail in pixels",
                value: format!("{}px", settings.size),
            },
            SettingRow {
                name: "Border radius",
                description: "Corner radius of the thumbnail in pixels",
                value: format!("{}px", settings.border_radius),
            },
            SettingRow {
                name: "Extra margin",
                description: "Offsets around the thumbnail (top right bottom left)",
                value: settings.extra_margin.to_css(),
            },
            SettingRow {
                name: "Real-time update",
                description: "Watch the workspace and decorate new cards as they appear",
                value: String::from(if settings.enable_real_time_update { "on" } else { "off" }),
            },
        ]
    }

    pub fn set_real_time_update<V: Vault, S: SettingsStore>(
        &self,
        plugin: &mut ThumbnailPlugin<V, S>,
        enabled: bool,
    ) -> Result<()> {
        plugin.set_real_time_update(enabled)
    }
}
