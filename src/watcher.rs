use tracing::debug;

use crate::dom::{ObserverId, UiTree};
use crate::reconciler::CARD_CLASS;

pub const WORKSPACE_CLASS: &str = "workspace";

/// Watches the workspace for newly inserted cards. Owns at most one observer
/// on the tree.
#[derive(Debug, Default)]
pub struct MutationWatcher {
    observer: Option<ObserverId>,
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    /// (Re)start observation of the workspace root, dropping any previous
    /// observer first.
    pub fn start(&mut self, tree: &mut UiTree) {
        self.stop(tree);
        let target = tree
            .find_first(tree.root(), WORKSPACE_CLASS)
            .unwrap_or_else(|| tree.root());
        self.observer = Some(tree.observe(target));
        debug!("mutation watcher started");
    }

    pub fn stop(&mut self, tree: &mut UiTree) {
        if let Some(observer) = self.observer.take() {
            tree.disconnect(observer);
            debug!("mutation watcher stopped");
        }
    }

    /// Drain the pending batch. True when any added node is, or contains, a
    /// card, meaning one update should be scheduled for the whole batch.
    pub fn take_batch(&mut self, tree: &mut UiTree) -> bool {
        let Some(observer) = self.observer else {
            return false;
        };
        let records = tree.take_records(observer);
        let cards_added = records
            .iter()
            .flat_map(|record| record.added_nodes.iter())
            .any(|&node| tree.is_or_contains(node, CARD_CLASS));
        if cards_added {
            debug!(records = records.len(), "cards inserted");
        }
        cards_added
    }
}
