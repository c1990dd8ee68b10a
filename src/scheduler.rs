//! Single-slot debounce register.
//!
//! At most one action is pending. Arming any action replaces whatever was
//! pending, so a steady stream of triggers keeps pushing execution back until
//! the stream pauses for longer than the delay.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

pub const LAYOUT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const CANVAS_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DECORATE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Re-arm as [`ScheduledAction::Decorate`]; no rescan.
    RefreshCards,
    /// Rescan every canvas, then re-arm as [`ScheduledAction::Decorate`].
    Rescan,
    /// Run the reconciler against the current map.
    Decorate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTask {
    action: ScheduledAction,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct UpdateScheduler {
    pending: Option<PendingTask>,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn arm(&mut self, action: ScheduledAction, now: Instant, delay: Duration) {
        if let Some(previous) = self.pending.take() {
            trace!(action = ?previous.action, "replacing pending update");
        }
        self.pending = Some(PendingTask {
            action,
            deadline: now + delay,
        });
    }

    /// Layout changed or cards appeared: refresh decorations soon.
    pub fn schedule_update(&mut self, now: Instant) {
        self.arm(ScheduledAction::RefreshCards, now, LAYOUT_DEBOUNCE);
    }

    /// A canvas document changed: rescan, then refresh decorations.
    pub fn schedule_canvas_update(&mut self, now: Instant) {
        self.arm(ScheduledAction::Rescan, now, CANVAS_DEBOUNCE);
    }

    pub fn update_card_thumbnails(&mut self, now: Instant) {
        self.arm(ScheduledAction::Decorate, now, DECORATE_DELAY);
    }

    pub fn cancel(&mut self) -> Option<ScheduledAction> {
        self.pending.take().map(|task| task.action)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_action(&self) -> Option<ScheduledAction> {
        self.pending.map(|task| task.action)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|task| task.deadline)
    }

    /// Hand out the pending action once its deadline has passed, emptying the
    /// slot.
    pub fn take_due(&mut self, now: Instant) -> Option<ScheduledAction> {
        match self.pending {
            Some(task) if task.deadline <= now => {
                self.pending = None;
                Some(task.action)
            }
            _ => None,
        }
    }
}
