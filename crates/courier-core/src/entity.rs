//! Entity maps that accompany every raw update.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric user identifier.
pub type UserId = i64;

/// Numeric chat identifier.
pub type ChatId = i64;

/// Users and chats referenced by a raw update, keyed by id.
///
/// The transport decodes these alongside the update itself. Records are kept
/// as opaque JSON: turning them into rich objects is the parsers' job. The
/// dispatcher shares one instance per update behind an `Arc` and never
/// mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMaps {
    /// Users keyed by id.
    #[serde(default)]
    pub users: HashMap<UserId, Value>,
    /// Chats and channels keyed by id.
    #[serde(default)]
    pub chats: HashMap<ChatId, Value>,
}

impl EntityMaps {
    /// Creates entity maps from already decoded records.
    pub fn new(users: HashMap<UserId, Value>, chats: HashMap<ChatId, Value>) -> Self {
        Self { users, chats }
    }

    /// Adds a user record (builder pattern).
    pub fn with_user(mut self, id: UserId, record: Value) -> Self {
        self.users.insert(id, record);
        self
    }

    /// Adds a chat record (builder pattern).
    pub fn with_chat(mut self, id: ChatId, record: Value) -> Self {
        self.chats.insert(id, record);
        self
    }

    /// Looks up a user record.
    pub fn user(&self, id: UserId) -> Option<&Value> {
        self.users.get(&id)
    }

    /// Looks up a chat record.
    pub fn chat(&self, id: ChatId) -> Option<&Value> {
        self.chats.get(&id)
    }

    /// Returns `true` when neither map holds a record.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.chats.is_empty()
    }
}
