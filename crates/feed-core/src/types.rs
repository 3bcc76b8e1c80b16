use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stored message fields, as kept under `/messages/{id}` in the remote feed.
///
/// The store-assigned id is the record's key, not part of the record; see
/// [`Message`] for the id-tagged client-side view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Room this message belongs to. Immutable.
    pub room_id: String,
    /// Creation time in milliseconds since the Unix epoch. Immutable;
    /// defines the feed's total order.
    pub created_at: i64,
    /// User id of the sender.
    pub author: String,
    /// Text body. Absent for attachment-only messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Number of likers. Kept equal to `likes.len()` by the mutation engine.
    #[serde(default)]
    pub like_count: u32,
    /// Key existence means "liked by this user". Omitted on the wire when
    /// nobody likes the message.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub likes: BTreeMap<String, bool>,
    /// Attachment metadata, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
}

/// Attachment metadata carried by a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Original file name, for display.
    pub name: String,
    /// Location of the payload: an external object reference, or a data URL
    /// when `inline` is set.
    pub url: String,
    /// `true` when the payload is embedded in the record itself and no
    /// external object exists for it.
    #[serde(default)]
    pub inline: bool,
}

/// A feed message tagged with its store-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned record key.
    pub id: String,
    /// The stored fields.
    #[serde(flatten)]
    pub record: MessageRecord,
}

/// Denormalized copy of a room's most recent message, written by the delete
/// cascade and kept under `/rooms/{id}/lastMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomLastMessage {
    /// Copy of the referenced message's stored fields.
    #[serde(flatten)]
    pub record: MessageRecord,
    /// Id of the message this copy was taken from.
    pub msg_id: String,
}

/// Stored room fields, as kept under `/rooms/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Key existence means "is admin".
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub admins: BTreeMap<String, bool>,
    /// Denormalized most recent message, absent when the room has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<RoomLastMessage>,
}

/// One ordered feed snapshot published by the pagination controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    /// Room the snapshot belongs to. Listeners must discard updates tagged
    /// with a room they are not displaying.
    pub room_id: String,
    /// Window contents, ascending by creation time.
    pub messages: Vec<Message>,
    /// Whether a full page is loaded and older history may exist.
    pub can_load_more: bool,
}
