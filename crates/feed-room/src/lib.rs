//! Room feed synchronization against the remote store.
//!
//! [`pagination::PaginationController`] owns the live subscription window for
//! one room view; [`mutations::MutationEngine`] is the write side, routing
//! every shared-counter change through the store's atomic primitives.

/// Conflict-safe mutations: admin/like toggles and delete-with-cascade.
pub mod mutations;
/// Expanding-window live subscription over one room's message feed.
pub mod pagination;

pub use mutations::{AdminToggle, DeleteOutcome, LikeToggle, MutationEngine};
pub use pagination::{DEFAULT_PAGE_SIZE, FeedUpdateStream, PaginationController};

const MESSAGES_ROOT: &str = "/messages";

pub(crate) fn message_path(message_id: &str) -> String {
    format!("{MESSAGES_ROOT}/{message_id}")
}

pub(crate) fn room_admins_path(room_id: &str) -> String {
    format!("/rooms/{room_id}/admins")
}

pub(crate) fn room_last_message_path(room_id: &str) -> String {
    format!("/rooms/{room_id}/lastMessage")
}
