//! View-state reducer turning feed updates and mutation outcomes into
//! render-ready snapshots.

use tracing::debug;

use feed_core::{
    DayGroup, FeedUpdate, LoadMoreAnchor, ScrollAnchor, ScrollInstruction, StoreError, Viewport,
    group_by_day,
};
use feed_room::{AdminToggle, DeleteOutcome, LikeToggle};

/// Severity of a transient user notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One transient user notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Render-ready snapshot of the room view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Messages grouped by calendar day, in chronological order.
    pub groups: Vec<DayGroup>,
    /// Whether the load-more affordance should be offered.
    pub can_load_more: bool,
    /// Whether the room has no messages at all ("No messages yet").
    pub is_empty: bool,
}

/// Mutable view state fed by controller updates and mutation outcomes.
pub struct RoomViewState {
    room_id: String,
    anchor: ScrollAnchor,
    update: Option<FeedUpdate>,
    viewport: Option<Viewport>,
    notices: Vec<Notice>,
}

impl RoomViewState {
    /// Create a view state for one room.
    pub fn new(room_id: impl Into<String>, bottom_threshold_pct: f64) -> Self {
        Self {
            room_id: room_id.into(),
            anchor: ScrollAnchor::new(bottom_threshold_pct),
            update: None,
            viewport: None,
            notices: Vec::new(),
        }
    }

    /// Room this view displays.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Record the latest viewport geometry reported by the host.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Apply a feed update and decide the scroll behavior for it.
    ///
    /// Updates tagged with another room are discarded and preserve the
    /// current position.
    pub fn apply_update(&mut self, update: FeedUpdate) -> ScrollInstruction {
        if update.room_id != self.room_id {
            debug!(
                expected = %self.room_id,
                received = %update.room_id,
                "discarding feed update for another room"
            );
            return ScrollInstruction::PreservePosition;
        }

        let instruction = self.anchor.on_snapshot(self.viewport);
        self.update = Some(update);
        instruction
    }

    /// Snapshot the current geometry ahead of a load-more fetch, when known.
    pub fn capture_load_more_anchor(&self) -> Option<LoadMoreAnchor> {
        self.viewport.map(LoadMoreAnchor::capture)
    }

    /// Record the outcome of an admin toggle.
    pub fn notice_admin(&mut self, outcome: Option<AdminToggle>) {
        let text = match outcome {
            Some(AdminToggle::Granted) => "Admin permission granted",
            Some(AdminToggle::Removed) => "Admin permission removed",
            None => return,
        };
        self.push_notice(NoticeLevel::Info, text);
    }

    /// Record the outcome of a like toggle.
    pub fn notice_like(&mut self, outcome: Option<LikeToggle>) {
        let text = match outcome {
            Some(LikeToggle::Added) => "Like added",
            Some(LikeToggle::Removed) => "Like removed",
            None => return,
        };
        self.push_notice(NoticeLevel::Info, text);
    }

    /// Record the outcome of a delete request.
    pub fn notice_delete(&mut self, outcome: &DeleteOutcome) {
        match outcome {
            DeleteOutcome::Declined => {}
            DeleteOutcome::Deleted {
                orphaned_attachment,
            } => {
                self.push_notice(NoticeLevel::Info, "Message has been deleted");
                if let Some(err) = orphaned_attachment {
                    self.push_notice(NoticeLevel::Error, err.to_string());
                }
            }
        }
    }

    /// Record a failed store operation, surfacing its message verbatim.
    pub fn notice_store_error(&mut self, error: &StoreError) {
        self.push_notice(NoticeLevel::Error, error.to_string());
    }

    /// Drain pending notices in arrival order.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Current render-ready snapshot.
    pub fn snapshot(&self) -> ViewSnapshot {
        match &self.update {
            Some(update) => ViewSnapshot {
                groups: group_by_day(&update.messages),
                can_load_more: update.can_load_more,
                is_empty: update.messages.is_empty(),
            },
            None => ViewSnapshot {
                groups: Vec::new(),
                can_load_more: false,
                is_empty: false,
            },
        }
    }

    fn push_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
        });
    }
}
