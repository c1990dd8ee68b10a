use async_trait::async_trait;
use canvas_thumbnails::{
    run, scan_canvases, FsVault, JsonFileStore, MemoryStore, MemoryVault, NodeId, PluginEvent,
    RefreshButton, ScheduledAction, SettingsPanel, SettingsStore, ThumbnailError, ThumbnailPlugin,
    UiTree, Vault, VaultFile, CARDS_CONTAINER_CLASS, CARD_CLASS, CARD_COVER_CLASS,
    CARD_FILE_NAME_CLASS, REFRESH_BUSY_LABEL, REFRESH_IDLE_LABEL, THUMBNAIL_MARKER_ATTR,
    WORKSPACE_CLASS,
};
use serial_test::serial;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot, watch};

fn canvas_with_files(files: &[&str]) -> String {
    let nodes: Vec<String> = files
        .iter()
        .enumerate()
        .map(|(i, file)| format!(r#"{{"id":"{}","type":"file","file":"{}"}}"#, i, file))
        .collect();
    format!(r#"{{"nodes":[{}],"edges":[]}}"#, nodes.join(","))
}

fn build_workspace(names: &[&str]) -> (UiTree, NodeId) {
    let mut tree = UiTree::new();
    let root = tree.root();
    let workspace = tree.append_element(root, "div", &[WORKSPACE_CLASS]);
    let container = tree.append_element(workspace, "div", &[CARDS_CONTAINER_CLASS]);
    for name in names {
        add_card(&mut tree, container, name);
    }
    (tree, container)
}

fn add_card(tree: &mut UiTree, container: NodeId, name: &str) -> NodeId {
    let card = tree.append_element(container, "div", &[CARD_CLASS]);
    let cover = tree.append_element(card, "div", &[CARD_COVER_CLASS]);
    let title = tree.append_element(card, "div", &[CARD_FILE_NAME_CLASS]);
    tree.set_text(title, name);
    cover
}

fn decorated(tree: &UiTree) -> usize {
    tree.find_all_with_attribute(tree.root(), THUMBNAIL_MARKER_ATTR).len()
}

fn sample_vault() -> MemoryVault {
    MemoryVault::new()
        .with_file("Projects/Alpha.canvas", canvas_with_files(&["Projects/alpha.png"]))
        .with_file("Projects/alpha.png", "")
        .with_file("Beta.canvas", canvas_with_files(&["beta.gif"]))
        .with_file("beta.gif", "")
        .with_resource_base("app://local")
}

#[cfg(test)]
mod fs_vault_tests {
    use super::*;

    fn create_vault_structure(base_dir: &std::path::Path) -> std::io::Result<()> {
        fs::create_dir_all(base_dir.join("Projects/assets"))?;
        fs::create_dir_all(base_dir.join(".obsidian"))?;

        fs::write(base_dir.join("Projects/assets/cover.png"), b"fake png")?;
        fs::write(base_dir.join("Projects/doc.pdf"), b"fake pdf")?;
        fs::write(
            base_dir.join("Projects/Alpha.canvas"),
            canvas_with_files(&["Projects/doc.pdf", "Projects/assets/cover.png"]),
        )?;
        fs::write(base_dir.join("Broken.canvas"), b"{ nodes")?;
        fs::write(base_dir.join("Missing.canvas"), canvas_with_files(&["nowhere.png"]))?;
        fs::write(base_dir.join("Note.md"), b"# note")?;
        fs::write(
            base_dir.join(".obsidian/Hidden.canvas"),
            canvas_with_files(&["Projects/assets/cover.png"]),
        )?;
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_end_to_end_scan_of_directory_vault() {
        let temp_dir = TempDir::new().unwrap();
        create_vault_structure(temp_dir.path()).unwrap();

        let vault = FsVault::new(temp_dir.path());
        let map = scan_canvases(&vault).await;

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Projects/Alpha.canvas"), Some("Projects/assets/cover.png"));
    }

    #[test]
    #[serial]
    fn test_listing_uses_forward_slashes_and_skips_hidden() {
        let temp_dir = TempDir::new().unwrap();
        create_vault_structure(temp_dir.path()).unwrap();

        let vault = FsVault::new(temp_dir.path());
        let files = vault.list_files();

        assert!(files.contains(&VaultFile::new("Projects/Alpha.canvas")));
        assert!(files.contains(&VaultFile::new("Projects/assets/cover.png")));
        assert!(files.iter().all(|f| !f.path.starts_with(".obsidian")));
        assert!(vault.exists("Projects/doc.pdf"));
        assert!(!vault.exists("Projects"));
    }

    #[test]
    #[serial]
    fn test_resource_url_points_at_the_file() {
        let temp_dir = TempDir::new().unwrap();
        create_vault_structure(temp_dir.path()).unwrap();

        let vault = FsVault::new(temp_dir.path());
        let url = vault.resource_url("Projects/assets/cover.png").unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/Projects/assets/cover.png"));
        assert!(vault.resource_url("Projects/assets/missing.png").is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_paths_outside_the_vault_are_not_resolved() {
        let temp_dir = TempDir::new().unwrap();
        let vault_dir = temp_dir.path().join("vault");
        fs::create_dir_all(vault_dir.join("Projects")).unwrap();
        fs::write(temp_dir.path().join("secret.png"), b"fake png").unwrap();
        fs::write(vault_dir.join("A.canvas"), canvas_with_files(&["../secret.png"])).unwrap();
        fs::write(
            vault_dir.join("Projects/B.canvas"),
            canvas_with_files(&["Projects/../../secret.png"]),
        )
        .unwrap();

        let vault = FsVault::new(&vault_dir);
        let map = scan_canvases(&vault).await;

        assert!(map.is_empty());
        assert!(!vault.exists("../secret.png"));
        assert!(matches!(
            vault.resource_url("../secret.png"),
            Err(ThumbnailError::FileNotFound(_))
        ));
        assert!(vault.read("../secret.png").await.is_err());
    }
}

#[cfg(test)]
mod settings_persistence_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_missing_file_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data.json"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    #[serial]
    fn test_toggle_is_persisted_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let settings_file = temp_dir.path().join("nested").join("dir").join("data.json");

        let (tree, _) = build_workspace(&[]);
        let mut plugin = ThumbnailPlugin::load(
            MemoryVault::new(),
            JsonFileStore::new(&settings_file),
            tree,
        );
        plugin.set_real_time_update(false).unwrap();

        assert!(settings_file.exists());
        let content = fs::read_to_string(&settings_file).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(saved["enableRealTimeUpdate"], serde_json::json!(false));
        assert_eq!(saved["size"], serde_json::json!(32));

        let reloaded = ThumbnailPlugin::load(
            MemoryVault::new(),
            JsonFileStore::new(&settings_file),
            UiTree::new(),
        );
        assert!(!reloaded.settings().enable_real_time_update);
        assert!(!reloaded.watcher().is_active());
    }

    #[test]
    #[serial]
    fn test_corrupt_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings_file = temp_dir.path().join("data.json");
        fs::write(&settings_file, b"not json at all").unwrap();

        let plugin = ThumbnailPlugin::load(
            MemoryVault::new(),
            JsonFileStore::new(&settings_file),
            UiTree::new(),
        );

        assert_eq!(plugin.settings().size, 32);
        assert!(plugin.settings().enable_real_time_update);
    }
}

#[cfg(test)]
mod plugin_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_workspace_ready_scans_then_decorates() {
        let (tree, _) = build_workspace(&["Alpha", "Beta", "Gamma"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);

        plugin.on_workspace_ready().await;

        assert_eq!(plugin.thumbnails().len(), 2);
        assert_eq!(plugin.scheduler().pending_action(), Some(ScheduledAction::Decorate));
        assert_eq!(plugin.run_due().await, None);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(plugin.run_due().await, Some(ScheduledAction::Decorate));
        assert_eq!(decorated(plugin.workspace()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_layout_changes_debounce_to_one_pass() {
        let (tree, _) = build_workspace(&["Alpha"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        plugin.rescan().await;

        for _ in 0..5 {
            plugin.on_layout_change();
            tokio::time::advance(Duration::from_millis(100)).await;
            assert_eq!(plugin.run_due().await, None);
        }

        // 100ms since the last call; 400ms more brings us to the deadline.
        tokio::time::advance(Duration::from_millis(399)).await;
        assert_eq!(plugin.run_due().await, None);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(plugin.run_due().await, Some(ScheduledAction::RefreshCards));
        assert_eq!(decorated(plugin.workspace()), 0);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(plugin.run_due().await, Some(ScheduledAction::Decorate));
        assert_eq!(decorated(plugin.workspace()), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(plugin.run_due().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_canvas_modifications_trigger_rescan() {
        let (tree, _) = build_workspace(&["Alpha", "Delta"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        plugin.rescan().await;

        assert!(!plugin.on_file_modified("notes/todo.md"));
        assert!(!plugin.scheduler().is_pending());

        plugin.vault_mut().insert("Delta.canvas", canvas_with_files(&["Projects/alpha.png"]));
        assert!(plugin.on_file_modified("Delta.canvas"));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(plugin.run_due().await, Some(ScheduledAction::Rescan));
        assert!(plugin.thumbnails().contains("Delta.canvas"));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(plugin.run_due().await, Some(ScheduledAction::Decorate));
        assert_eq!(decorated(plugin.workspace()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inserted_cards_schedule_one_update_per_batch() {
        let (tree, container) = build_workspace(&[]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        plugin.rescan().await;
        assert!(plugin.watcher().is_active());

        add_card(plugin.workspace_mut(), container, "Alpha");
        add_card(plugin.workspace_mut(), container, "Beta");

        assert!(plugin.flush_mutations());
        assert_eq!(plugin.scheduler().pending_action(), Some(ScheduledAction::RefreshCards));
        assert!(!plugin.flush_mutations());

        tokio::time::advance(Duration::from_millis(500)).await;
        plugin.run_due().await;
        tokio::time::advance(Duration::from_millis(200)).await;
        plugin.run_due().await;
        assert_eq!(decorated(plugin.workspace()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_real_time_update_stops_watching() {
        let (tree, container) = build_workspace(&[]);
        let store = MemoryStore::new();
        let mut plugin = ThumbnailPlugin::load(sample_vault(), store, tree);

        plugin.set_real_time_update(false).unwrap();
        assert!(!plugin.watcher().is_active());
        assert_eq!(plugin.workspace().observer_count(), 0);

        add_card(plugin.workspace_mut(), container, "Alpha");
        assert!(!plugin.flush_mutations());
        assert!(!plugin.scheduler().is_pending());

        plugin.set_real_time_update(true).unwrap();
        assert!(plugin.watcher().is_active());
        assert_eq!(plugin.workspace().observer_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_clears_everything() {
        let (tree, _) = build_workspace(&["Alpha", "Beta"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);

        assert_eq!(plugin.refresh().await, 2);
        plugin.on_layout_change();

        assert_eq!(plugin.unload(), 2);
        assert_eq!(decorated(plugin.workspace()), 0);
        assert!(!plugin.scheduler().is_pending());
        assert!(!plugin.watcher().is_active());
        assert_eq!(plugin.unload(), 0);
    }

    struct NoAdapterVault(MemoryVault);

    #[async_trait]
    impl Vault for NoAdapterVault {
        fn list_files(&self) -> Vec<VaultFile> {
            self.0.list_files()
        }

        async fn read(&self, path: &str) -> canvas_thumbnails::Result<String> {
            self.0.read(path).await
        }

        fn exists(&self, path: &str) -> bool {
            self.0.exists(path)
        }
    }

    #[tokio::test]
    async fn test_vault_without_adapter_decorates_nothing() {
        let (tree, _) = build_workspace(&["Alpha", "Beta"]);
        let mut plugin = ThumbnailPlugin::load(NoAdapterVault(sample_vault()), MemoryStore::new(), tree);

        assert_eq!(plugin.refresh().await, 0);
        assert_eq!(plugin.thumbnails().len(), 2);
    }
}

#[cfg(test)]
mod panel_tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_button_reports_and_resets_label() {
        let (tree, _) = build_workspace(&["Alpha", "Beta"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        let button = RefreshButton::default();

        assert_eq!(button.label(), REFRESH_IDLE_LABEL);
        assert_eq!(button.press(&mut plugin).await, 2);
        assert_eq!(button.label(), REFRESH_IDLE_LABEL);
        assert!(!button.is_busy());
        assert_eq!(button.press(&mut plugin).await, 0);
    }

    /// Records the refresh label every time a file is read during a scan.
    struct LabelRecordingVault {
        inner: MemoryVault,
        label: watch::Receiver<&'static str>,
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Vault for LabelRecordingVault {
        fn list_files(&self) -> Vec<VaultFile> {
            self.inner.list_files()
        }

        async fn read(&self, path: &str) -> canvas_thumbnails::Result<String> {
            self.seen.lock().unwrap().push(*self.label.borrow());
            self.inner.read(path).await
        }

        fn exists(&self, path: &str) -> bool {
            self.inner.exists(path)
        }

        fn resource_url(&self, path: &str) -> canvas_thumbnails::Result<String> {
            self.inner.resource_url(path)
        }
    }

    #[tokio::test]
    async fn test_busy_label_is_visible_while_refresh_runs() {
        let button = RefreshButton::default();
        let vault = LabelRecordingVault {
            inner: sample_vault(),
            label: button.subscribe(),
            seen: Mutex::new(Vec::new()),
        };
        let (tree, _) = build_workspace(&["Alpha", "Beta"]);
        let mut plugin = ThumbnailPlugin::load(vault, MemoryStore::new(), tree);
        let mut watcher = button.subscribe();

        assert_eq!(button.press(&mut plugin).await, 2);

        let seen = plugin.vault().seen.lock().unwrap().clone();
        assert_eq!(seen, vec![REFRESH_BUSY_LABEL, REFRESH_BUSY_LABEL]);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), REFRESH_IDLE_LABEL);
        assert!(!button.is_busy());
    }

    #[test]
    fn test_panel_toggle_persists_and_rows_reflect_it() {
        let (tree, _) = build_workspace(&[]);
        let mut plugin = ThumbnailPlugin::load(MemoryVault::new(), MemoryStore::new(), tree);
        let panel = SettingsPanel::new();

        panel.set_real_time_update(&mut plugin, false).unwrap();

        let rows = SettingsPanel::rows(plugin.settings());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].value, "32px");
        assert_eq!(rows[3].value, "off");
        assert!(!plugin.watcher().is_active());
    }
}

#[cfg(test)]
mod event_loop_tests {
    use super::*;

    async fn count_decorated(events: &mpsc::Sender<PluginEvent>) -> usize {
        let (tx, rx) = oneshot::channel();
        events
            .send(PluginEvent::Ui(Box::new(move |tree: &mut UiTree| {
                let _ = tx.send(decorated(tree));
            })))
            .await
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_lifecycle_through_event_loop() {
        let (tree, container) = build_workspace(&["Alpha"]);
        let plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        let (events, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run(plugin, rx));

        events.send(PluginEvent::WorkspaceReady).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count_decorated(&events).await, 1);

        // A card for Beta shows up later; the watcher picks it up.
        events
            .send(PluginEvent::Ui(Box::new(move |tree: &mut UiTree| {
                add_card(tree, container, "Beta");
            })))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count_decorated(&events).await, 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count_decorated(&events).await, 2);

        let (reply, refreshed) = oneshot::channel();
        events.send(PluginEvent::Refresh(reply)).await.unwrap();
        assert_eq!(refreshed.await.unwrap(), 0);

        events.send(PluginEvent::Unload).await.unwrap();
        let plugin = handle.await.unwrap();
        assert_eq!(decorated(plugin.workspace()), 0);
        assert!(!plugin.watcher().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_sender_tears_down() {
        let (tree, _) = build_workspace(&["Alpha"]);
        let mut plugin = ThumbnailPlugin::load(sample_vault(), MemoryStore::new(), tree);
        plugin.refresh().await;
        let (events, rx) = mpsc::channel(4);
        let handle = tokio::spawn(run(plugin, rx));

        events.send(PluginEvent::LayoutChange).await.unwrap();
        drop(events);

        let plugin = handle.await.unwrap();
        assert_eq!(decorated(plugin.workspace()), 0);
        assert!(!plugin.scheduler().is_pending());
    }
}
