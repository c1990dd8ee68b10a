use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::dom::UiTree;
use crate::plugin::ThumbnailPlugin;
use crate::settings::SettingsStore;
use crate::vault::Vault;

pub type UiEdit = Box<dyn FnOnce(&mut UiTree) + Send>;

/// Events the host delivers to a running plugin.
pub enum PluginEvent {
    WorkspaceReady,
    LayoutChange,
    FileModified(String),
    /// A host-side change to the live UI, applied in event order.
    Ui(UiEdit),
    SetRealTimeUpdate(bool),
    Refresh(oneshot::Sender<usize>),
    Unload,
}

impl fmt::Debug for PluginEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkspaceReady => f.write_str("WorkspaceReady"),
            Self::LayoutChange => f.write_str("LayoutChange"),
            Self::FileModified(path) => f.debug_tuple("FileModified").field(path).finish(),
            Self::Ui(_) => f.write_str("Ui(..)"),
            Self::SetRealTimeUpdate(enabled) => {
                f.debug_tuple("SetRealTimeUpdate").field(enabled).finish()
            }
            Self::Refresh(_) => f.write_str("Refresh(..)"),
            Self::Unload => f.write_str("Unload"),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn dispatch<V: Vault, S: SettingsStore>(plugin: &mut ThumbnailPlugin<V, S>, event: PluginEvent) {
    debug!(?event, "plugin event");
    match event {
        PluginEvent::WorkspaceReady => plugin.on_workspace_ready().await,
        PluginEvent::LayoutChange => plugin.on_layout_change(),
        PluginEvent::FileModified(path) => {
            plugin.on_file_modified(&path);
        }
        PluginEvent::Ui(edit) => edit(plugin.workspace_mut()),
        PluginEvent::SetRealTimeUpdate(enabled) => {
            if let Err(e) = plugin.set_real_time_update(enabled) {
                warn!(error = %e, "real-time update toggle not persisted");
            }
        }
        PluginEvent::Refresh(reply) => {
            let updated = plugin.refresh().await;
            let _ = reply.send(updated);
        }
        PluginEvent::Unload => {}
    }
}

/// Drive `plugin` until `Unload` arrives or every sender is dropped, then
/// tear it down and hand it back.
///
/// Host events and the scheduler deadline are raced; whichever wins runs to
/// completion before the next one is looked at. Mutation batches are flushed
/// after each step.
pub async fn run<V: Vault, S: SettingsStore>(
    mut plugin: ThumbnailPlugin<V, S>,
    mut events: mpsc::Receiver<PluginEvent>,
) -> ThumbnailPlugin<V, S> {
    loop {
        let deadline = plugin.scheduler().deadline();
        tokio::select! {
            event = events.recv() => match event {
                Some(PluginEvent::Unload) | None => break,
                Some(event) => dispatch(&mut plugin, event).await,
            },
            _ = wait_until(deadline) => {
                plugin.run_due().await;
            }
        }
        plugin.flush_mutations();
    }

    plugin.unload();
    plugin
}
