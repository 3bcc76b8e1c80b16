use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use feed_core::{FileRef, Message, RoomLastMessage, StoreError};
use feed_store::RemoteStore;

use crate::{message_path, room_admins_path, room_last_message_path};

/// Direction of a completed admin toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminToggle {
    /// The user is now an admin.
    Granted,
    /// The user is no longer an admin.
    Removed,
}

/// Direction of a completed like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    /// The current user now likes the message.
    Added,
    /// The current user's like was withdrawn.
    Removed,
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The caller declined the confirmation; nothing was touched.
    Declined,
    /// The message (and any lastMessage cascade) committed atomically.
    Deleted {
        /// Set when the external attachment could not be removed afterwards.
        /// The message record itself is already gone; an orphaned object is
        /// a logged degradation, not a failure of the deletion.
        orphaned_attachment: Option<StoreError>,
    },
}

/// Write side of the room view.
///
/// The admins mapping, the likes mapping, and the lastMessage pointer are
/// only ever touched through the store's atomic primitives; transaction
/// bodies are pure so store-side conflict retries stay safe.
pub struct MutationEngine {
    store: Arc<dyn RemoteStore>,
    current_user: String,
}

impl MutationEngine {
    /// Create an engine acting as `current_user` (supplied by the session
    /// collaborator).
    pub fn new(store: Arc<dyn RemoteStore>, current_user: impl Into<String>) -> Self {
        Self {
            store,
            current_user: current_user.into(),
        }
    }

    /// Flip `target_user`'s admin membership for `room_id`.
    ///
    /// Returns `None` without writing when the room's admins node is not
    /// loaded. The outcome is derived from the committed value, so it stays
    /// correct even when the store retried the transaction body.
    pub async fn toggle_admin(
        &self,
        room_id: &str,
        target_user: &str,
    ) -> Result<Option<AdminToggle>, StoreError> {
        let target = target_user.to_owned();
        let committed = self
            .store
            .run_atomic(&room_admins_path(room_id), &move |current| match current {
                Some(Value::Object(mut admins)) => {
                    if admins.remove(&target).is_none() {
                        admins.insert(target.clone(), Value::Bool(true));
                    }
                    Some(Value::Object(admins))
                }
                other => other,
            })
            .await?;

        let outcome = match committed {
            Some(Value::Object(admins)) => {
                if admins.contains_key(target_user) {
                    Some(AdminToggle::Granted)
                } else {
                    Some(AdminToggle::Removed)
                }
            }
            _ => None,
        };

        debug!(room_id = %room_id, target_user = %target_user, ?outcome, "admin toggle");
        Ok(outcome)
    }

    /// Flip the current user's like on `message_id`.
    ///
    /// Membership check, likes mutation, and the `likeCount` step all happen
    /// inside one transaction body, keeping the count equal to the number of
    /// likers under concurrent toggles. A vanished message is a no-op.
    pub async fn toggle_like(&self, message_id: &str) -> Result<Option<LikeToggle>, StoreError> {
        let user = self.current_user.clone();
        let committed = self
            .store
            .run_atomic(&message_path(message_id), &move |current| match current {
                Some(Value::Object(mut message)) => {
                    let mut likes = match message.remove("likes") {
                        Some(Value::Object(likes)) => likes,
                        _ => Map::new(),
                    };
                    let like_count = message
                        .get("likeCount")
                        .and_then(Value::as_i64)
                        .unwrap_or(0);

                    let next_count = if likes.remove(&user).is_some() {
                        like_count - 1
                    } else {
                        likes.insert(user.clone(), Value::Bool(true));
                        like_count + 1
                    };

                    message.insert("likeCount".to_owned(), json!(next_count.max(0)));
                    if !likes.is_empty() {
                        message.insert("likes".to_owned(), Value::Object(likes));
                    }
                    Some(Value::Object(message))
                }
                other => other,
            })
            .await?;

        let outcome = match committed {
            Some(Value::Object(message)) => {
                let liked = message
                    .get("likes")
                    .and_then(Value::as_object)
                    .is_some_and(|likes| likes.contains_key(&self.current_user));
                Some(if liked {
                    LikeToggle::Added
                } else {
                    LikeToggle::Removed
                })
            }
            _ => None,
        };

        debug!(message_id = %message_id, ?outcome, "like toggle");
        Ok(outcome)
    }

    /// Delete `target_id` and keep the room's lastMessage pointer consistent
    /// in the same commit.
    ///
    /// `ordered_messages` is the loaded window and must contain the true
    /// feed tail; the replacement lastMessage is derived from its
    /// second-to-last entry. `confirmed` carries the caller's destructive
    /// confirmation decision; declining aborts before any store interaction.
    pub async fn delete_message(
        &self,
        room_id: &str,
        ordered_messages: &[Message],
        target_id: &str,
        attachment: Option<&FileRef>,
        confirmed: bool,
    ) -> Result<DeleteOutcome, StoreError> {
        if !confirmed {
            debug!(message_id = %target_id, "delete declined; nothing written");
            return Ok(DeleteOutcome::Declined);
        }

        let is_last = ordered_messages
            .last()
            .is_some_and(|message| message.id == target_id);

        let mut updates: HashMap<String, Option<Value>> = HashMap::new();
        updates.insert(message_path(target_id), None);

        if is_last && ordered_messages.len() > 1 {
            let successor = &ordered_messages[ordered_messages.len() - 2];
            let last_message = RoomLastMessage {
                record: successor.record.clone(),
                msg_id: successor.id.clone(),
            };
            let value = serde_json::to_value(&last_message)
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            updates.insert(room_last_message_path(room_id), Some(value));
        } else if is_last {
            updates.insert(room_last_message_path(room_id), None);
        }

        self.store.apply_multi_path_update(updates).await?;
        info!(room_id = %room_id, message_id = %target_id, cascaded = is_last, "message deleted");

        let orphaned_attachment = match attachment {
            Some(file) if !file.inline => {
                match self.store.delete_external_object(&file.url).await {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(
                            url = %file.url,
                            error = %err,
                            "external attachment deletion failed after message delete"
                        );
                        Some(err)
                    }
                }
            }
            _ => None,
        };

        Ok(DeleteOutcome::Deleted {
            orphaned_attachment,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use feed_core::MessageRecord;
    use feed_store::InMemoryStore;

    fn engine_for(store: &Arc<InMemoryStore>, user: &str) -> MutationEngine {
        MutationEngine::new(store.clone(), user)
    }

    fn message(id: &str, room_id: &str, created_at: i64) -> Message {
        Message {
            id: id.to_owned(),
            record: MessageRecord {
                room_id: room_id.to_owned(),
                created_at,
                author: "uid-alice".to_owned(),
                body: Some(format!("body of {id}")),
                like_count: 0,
                likes: BTreeMap::new(),
                file: None,
            },
        }
    }

    fn seed_message(store: &InMemoryStore, message: &Message) {
        let value = serde_json::to_value(&message.record).expect("serialize record");
        store
            .seed(&format!("/messages/{}", message.id), value)
            .expect("seed should work");
    }

    #[tokio::test]
    async fn toggle_admin_twice_restores_the_original_mapping() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed("/rooms/r1/admins", json!({ "uid-owner": true }))
            .expect("seed should work");
        let engine = engine_for(&store, "uid-owner");

        let granted = engine
            .toggle_admin("r1", "uid-bob")
            .await
            .expect("toggle should work");
        assert_eq!(granted, Some(AdminToggle::Granted));

        let removed = engine
            .toggle_admin("r1", "uid-bob")
            .await
            .expect("toggle should work");
        assert_eq!(removed, Some(AdminToggle::Removed));

        assert_eq!(
            store.read_value("/rooms/r1/admins").expect("read"),
            Some(json!({ "uid-owner": true }))
        );
    }

    #[tokio::test]
    async fn toggle_admin_is_silent_when_admins_are_not_loaded() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine_for(&store, "uid-owner");

        let outcome = engine
            .toggle_admin("ghost-room", "uid-bob")
            .await
            .expect("toggle should work");
        assert_eq!(outcome, None);
        assert_eq!(store.read_value("/rooms").expect("read"), None);
    }

    #[tokio::test]
    async fn like_count_tracks_distinct_likers() {
        let store = Arc::new(InMemoryStore::new());
        seed_message(&store, &message("m1", "r1", 100));

        for user in ["uid-a", "uid-b", "uid-c"] {
            let outcome = engine_for(&store, user)
                .toggle_like("m1")
                .await
                .expect("toggle should work");
            assert_eq!(outcome, Some(LikeToggle::Added));
        }

        let stored = store
            .read_value("/messages/m1")
            .expect("read")
            .expect("message should exist");
        assert_eq!(stored["likeCount"], 3);
        assert_eq!(stored["likes"].as_object().map(Map::len), Some(3));

        let removed = engine_for(&store, "uid-b")
            .toggle_like("m1")
            .await
            .expect("toggle should work");
        assert_eq!(removed, Some(LikeToggle::Removed));

        let stored = store
            .read_value("/messages/m1")
            .expect("read")
            .expect("message should exist");
        assert_eq!(stored["likeCount"], 2);
        assert!(stored["likes"].get("uid-b").is_none());
    }

    #[tokio::test]
    async fn concurrent_likers_keep_the_invariant() {
        let store = Arc::new(InMemoryStore::new());
        seed_message(&store, &message("m1", "r1", 100));

        let mut tasks = Vec::new();
        for index in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                engine_for(&store, &format!("uid-{index}"))
                    .toggle_like("m1")
                    .await
                    .expect("toggle should work")
            }));
        }
        for task in tasks {
            assert_eq!(task.await.expect("task"), Some(LikeToggle::Added));
        }

        let stored = store
            .read_value("/messages/m1")
            .expect("read")
            .expect("message should exist");
        assert_eq!(stored["likeCount"], 8);
        assert_eq!(stored["likes"].as_object().map(Map::len), Some(8));
    }

    #[tokio::test]
    async fn toggling_a_vanished_message_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let outcome = engine_for(&store, "uid-a")
            .toggle_like("gone")
            .await
            .expect("toggle should work");
        assert_eq!(outcome, None);
        assert_eq!(store.read_value("/messages/gone").expect("read"), None);
    }

    #[tokio::test]
    async fn removing_the_last_like_drops_the_likes_node() {
        let store = Arc::new(InMemoryStore::new());
        seed_message(&store, &message("m1", "r1", 100));
        let engine = engine_for(&store, "uid-a");

        engine.toggle_like("m1").await.expect("toggle should work");
        engine.toggle_like("m1").await.expect("toggle should work");

        let stored = store
            .read_value("/messages/m1")
            .expect("read")
            .expect("message should exist");
        assert_eq!(stored["likeCount"], 0);
        assert!(stored.get("likes").is_none());
    }

    #[tokio::test]
    async fn deleting_the_sole_message_clears_last_message() {
        let store = Arc::new(InMemoryStore::new());
        let only = message("m1", "r1", 100);
        seed_message(&store, &only);
        store
            .seed(
                "/rooms/r1/lastMessage",
                json!({ "roomId": "r1", "createdAt": 100, "author": "uid-alice", "msgId": "m1" }),
            )
            .expect("seed should work");

        let outcome = engine_for(&store, "uid-alice")
            .delete_message("r1", &[only], "m1", None, true)
            .await
            .expect("delete should work");
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                orphaned_attachment: None
            }
        );

        assert_eq!(store.read_value("/messages/m1").expect("read"), None);
        assert_eq!(store.read_value("/rooms/r1/lastMessage").expect("read"), None);
    }

    #[tokio::test]
    async fn deleting_the_tail_promotes_the_second_to_last() {
        let store = Arc::new(InMemoryStore::new());
        let older = message("m1", "r1", 100);
        let newer = message("m2", "r1", 200);
        seed_message(&store, &older);
        seed_message(&store, &newer);

        let window = vec![older.clone(), newer];
        engine_for(&store, "uid-alice")
            .delete_message("r1", &window, "m2", None, true)
            .await
            .expect("delete should work");

        assert_eq!(store.read_value("/messages/m2").expect("read"), None);
        let last = store
            .read_value("/rooms/r1/lastMessage")
            .expect("read")
            .expect("lastMessage should be set");
        assert_eq!(last["msgId"], "m1");
        assert_eq!(last["createdAt"], 100);
        assert_eq!(last["body"], "body of m1");
    }

    #[tokio::test]
    async fn deleting_a_non_tail_message_leaves_last_message_alone() {
        let store = Arc::new(InMemoryStore::new());
        let older = message("m1", "r1", 100);
        let newer = message("m2", "r1", 200);
        seed_message(&store, &older);
        seed_message(&store, &newer);
        store
            .seed(
                "/rooms/r1/lastMessage",
                json!({ "roomId": "r1", "createdAt": 200, "author": "uid-alice", "msgId": "m2" }),
            )
            .expect("seed should work");

        let window = vec![older, newer];
        engine_for(&store, "uid-alice")
            .delete_message("r1", &window, "m1", None, true)
            .await
            .expect("delete should work");

        assert_eq!(store.read_value("/messages/m1").expect("read"), None);
        let last = store
            .read_value("/rooms/r1/lastMessage")
            .expect("read")
            .expect("lastMessage should be untouched");
        assert_eq!(last["msgId"], "m2");
    }

    #[tokio::test]
    async fn declined_confirmation_touches_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let only = message("m1", "r1", 100);
        seed_message(&store, &only);

        let outcome = engine_for(&store, "uid-alice")
            .delete_message("r1", &[only], "m1", None, false)
            .await
            .expect("delete should work");
        assert_eq!(outcome, DeleteOutcome::Declined);
        assert!(store.read_value("/messages/m1").expect("read").is_some());
    }

    #[tokio::test]
    async fn external_attachment_is_removed_best_effort() {
        let store = Arc::new(InMemoryStore::new());
        let mut target = message("m1", "r1", 100);
        let file = FileRef {
            name: "photo.png".to_owned(),
            url: "https://files.example.org/photo.png".to_owned(),
            inline: false,
        };
        target.record.file = Some(file.clone());
        seed_message(&store, &target);
        store
            .put_external_object(&file.url)
            .expect("put should work");

        let outcome = engine_for(&store, "uid-alice")
            .delete_message("r1", &[target], "m1", Some(&file), true)
            .await
            .expect("delete should work");
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                orphaned_attachment: None
            }
        );
        assert!(!store.has_external_object(&file.url).expect("lookup"));
    }

    #[tokio::test]
    async fn failed_attachment_cleanup_does_not_undo_the_delete() {
        let store = Arc::new(InMemoryStore::new());
        let mut target = message("m1", "r1", 100);
        let file = FileRef {
            name: "photo.png".to_owned(),
            url: "https://files.example.org/missing.png".to_owned(),
            inline: false,
        };
        target.record.file = Some(file.clone());
        seed_message(&store, &target);

        let outcome = engine_for(&store, "uid-alice")
            .delete_message("r1", &[target], "m1", Some(&file), true)
            .await
            .expect("delete should work");

        match outcome {
            DeleteOutcome::Deleted {
                orphaned_attachment: Some(StoreError::Backend(_)),
            } => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.read_value("/messages/m1").expect("read"), None);
    }

    #[tokio::test]
    async fn inline_attachments_skip_external_cleanup() {
        let store = Arc::new(InMemoryStore::new());
        let mut target = message("m1", "r1", 100);
        let file = FileRef {
            name: "sticker.png".to_owned(),
            url: "data:image/png;base64,AAAA".to_owned(),
            inline: true,
        };
        target.record.file = Some(file.clone());
        seed_message(&store, &target);

        let outcome = engine_for(&store, "uid-alice")
            .delete_message("r1", &[target], "m1", Some(&file), true)
            .await
            .expect("delete should work");
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                orphaned_attachment: None
            }
        );
    }
}
