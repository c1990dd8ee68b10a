//! Coordinator owning every piece of per-instance state: the thumbnail map,
//! settings, the pending update slot, the mutation watcher and the UI tree.
//!
//! All handlers run to completion on the caller's task; the only suspension
//! points are the vault reads inside a rescan.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dom::UiTree;
use crate::reconciler::{clear_thumbnails, reconcile};
use crate::scanner::{scan_canvases, CanvasThumbnailMap};
use crate::scheduler::{ScheduledAction, UpdateScheduler};
use crate::settings::{load_settings, save_settings, SettingsStore, ThumbnailSettings};
use crate::vault::Vault;
use crate::watcher::MutationWatcher;
use crate::{is_canvas_path, Result};

pub struct ThumbnailPlugin<V, S> {
    vault: V,
    store: S,
    settings: ThumbnailSettings,
    thumbnails: CanvasThumbnailMap,
    scheduler: UpdateScheduler,
    watcher: MutationWatcher,
    workspace: UiTree,
}

impl<V: Vault, S: SettingsStore> ThumbnailPlugin<V, S> {
    /// Load settings from `store` and start the watcher if real-time updates
    /// are enabled. Nothing is scanned until the workspace is ready.
    pub fn load(vault: V, store: S, workspace: UiTree) -> Self {
        let settings = load_settings(&store);
        let mut plugin = Self {
            vault,
            store,
            settings,
            thumbnails: CanvasThumbnailMap::new(),
            scheduler: UpdateScheduler::new(),
            watcher: MutationWatcher::new(),
            workspace,
        };
        plugin.sync_watcher();
        info!(
            real_time_update = plugin.settings.enable_real_time_update,
            "canvas thumbnails loaded"
        );
        plugin
    }

    pub fn settings(&self) -> &ThumbnailSettings {
        &self.settings
    }

    pub fn thumbnails(&self) -> &CanvasThumbnailMap {
        &self.thumbnails
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn watcher(&self) -> &MutationWatcher {
        &self.watcher
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    pub fn workspace(&self) -> &UiTree {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut UiTree {
        &mut self.workspace
    }

    /// Replace the map with a fresh scan. Returns the number of entries.
    pub async fn rescan(&mut self) -> usize {
        self.thumbnails = scan_canvases(&self.vault).await;
        self.thumbnails.len()
    }

    /// Reconcile the current map against the workspace right away.
    pub fn decorate(&mut self) -> usize {
        reconcile(
            &self.thumbnails,
            &mut self.workspace,
            &self.vault,
            &self.settings,
        )
    }

    /// Scan and decorate immediately, bypassing the scheduler.
    pub async fn refresh(&mut self) -> usize {
        self.rescan().await;
        self.decorate()
    }

    pub async fn on_workspace_ready(&mut self) {
        self.rescan().await;
        self.scheduler.update_card_thumbnails(Instant::now());
    }

    pub fn on_layout_change(&mut self) {
        self.scheduler.schedule_update(Instant::now());
    }

    /// Only canvas documents trigger a rescan. Returns whether one was
    /// scheduled.
    pub fn on_file_modified(&mut self, path: &str) -> bool {
        if !is_canvas_path(path) {
            return false;
        }
        debug!(path, "canvas modified");
        self.scheduler.schedule_canvas_update(Instant::now());
        true
    }

    /// Deliver the watcher's pending batch. At most one update is scheduled
    /// per batch.
    pub fn flush_mutations(&mut self) -> bool {
        if self.watcher.take_batch(&mut self.workspace) {
            self.scheduler.schedule_update(Instant::now());
            true
        } else {
            false
        }
    }

    /// Run the pending action if its deadline has passed.
    pub async fn run_due(&mut self) -> Option<ScheduledAction> {
        let action = self.scheduler.take_due(Instant::now())?;
        debug!(?action, "running scheduled update");
        match action {
            ScheduledAction::RefreshCards => {
                self.scheduler.update_card_thumbnails(Instant::now());
            }
            ScheduledAction::Rescan => {
                self.rescan().await;
                self.scheduler.update_card_thumbnails(Instant::now());
            }
            ScheduledAction::Decorate => {
                self.decorate();
            }
        }
        Some(action)
    }

    /// Apply `change` to the settings, start or stop the watcher to match,
    /// and persist.
    pub fn update_settings(&mut self, change: impl FnOnce(&mut ThumbnailSettings)) -> Result<()> {
        change(&mut self.settings);
        self.sync_watcher();
        save_settings(&self.store, &self.settings).map_err(|e| {
            warn!(error = %e, "failed to save settings");
            e
        })
    }

    pub fn set_real_time_update(&mut self, enabled: bool) -> Result<()> {
        self.update_settings(|settings| settings.enable_real_time_update = enabled)
    }

    fn sync_watcher(&mut self) {
        match (self.settings.enable_real_time_update, self.watcher.is_active()) {
            (true, false) => self.watcher.start(&mut self.workspace),
            (false, true) => self.watcher.stop(&mut self.workspace),
            _ => {}
        }
    }

    /// Disconnect the watcher, drop any pending update and strip every
    /// decoration from the workspace. Returns the number of covers cleared.
    pub fn unload(&mut self) -> usize {
        self.watcher.stop(&mut self.workspace);
        self.scheduler.cancel();
        let cleared = clear_thumbnails(&mut self.workspace);
        info!(cleared, "canvas thumbnails unloaded");
        cleared
    }

    pub fn into_workspace(self) -> UiTree {
        self.workspace
    }
}
