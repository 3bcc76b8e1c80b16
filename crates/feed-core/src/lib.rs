//! Core contract shared between the store, sync, and presentation layers.
//!
//! This crate defines the message/room data model, the store error taxonomy,
//! and the pure view helpers (calendar-day grouping, scroll anchoring).

/// Store error taxonomy and classification helpers.
pub mod error;
/// Calendar-day grouping of ordered message sequences.
pub mod grouping;
/// Scroll-anchor decisions and load-more offset correction.
pub mod scroll;
/// Message/room data model and feed update payloads.
pub mod types;

pub use error::StoreError;
pub use grouping::{DayGroup, group_by_day, group_by_day_in};
pub use scroll::{
    DEFAULT_BOTTOM_THRESHOLD_PCT, LoadMoreAnchor, SETTLE_DELAY, ScrollAnchor, ScrollInstruction,
    Viewport, should_stick_to_bottom,
};
pub use types::{FeedUpdate, FileRef, Message, MessageRecord, Room, RoomLastMessage};
