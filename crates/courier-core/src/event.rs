//! Raw updates, event categories and parsed update objects.
//!
//! - [`RawEvent`] - an undecoded record tagged by the transport
//! - [`RawEventKind`] - the transport tags this dispatcher understands
//! - [`EventCategory`] - semantic classification used to select handlers
//! - [`ParsedUpdate`] - the type-erased domain object a parser produced

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

// ============================================================================
// Raw Event Kinds
// ============================================================================

/// The transport tag of a raw update.
///
/// Tags the dispatcher does not know about are represented as
/// [`RawEventKind::Unknown`]; the original constructor name is preserved on the
/// [`RawEvent`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    NewMessage,
    NewChannelMessage,
    NewScheduledMessage,
    EditMessage,
    EditChannelMessage,
    DeleteMessages,
    DeleteChannelMessages,
    BotCallbackQuery,
    InlineBotCallbackQuery,
    UserStatus,
    BotInlineQuery,
    MessagePoll,
    BotInlineSend,
    ChatParticipant,
    ChannelParticipant,
    BotChatInviteRequester,
    /// Any tag not listed above.
    Unknown,
}

impl RawEventKind {
    /// Every known tag, in declaration order.
    pub const KNOWN: [RawEventKind; 16] = [
        Self::NewMessage,
        Self::NewChannelMessage,
        Self::NewScheduledMessage,
        Self::EditMessage,
        Self::EditChannelMessage,
        Self::DeleteMessages,
        Self::DeleteChannelMessages,
        Self::BotCallbackQuery,
        Self::InlineBotCallbackQuery,
        Self::UserStatus,
        Self::BotInlineQuery,
        Self::MessagePoll,
        Self::BotInlineSend,
        Self::ChatParticipant,
        Self::ChannelParticipant,
        Self::BotChatInviteRequester,
    ];

    /// Resolves a wire constructor name, falling back to [`RawEventKind::Unknown`].
    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Returns the wire constructor name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "updateNewMessage",
            Self::NewChannelMessage => "updateNewChannelMessage",
            Self::NewScheduledMessage => "updateNewScheduledMessage",
            Self::EditMessage => "updateEditMessage",
            Self::EditChannelMessage => "updateEditChannelMessage",
            Self::DeleteMessages => "updateDeleteMessages",
            Self::DeleteChannelMessages => "updateDeleteChannelMessages",
            Self::BotCallbackQuery => "updateBotCallbackQuery",
            Self::InlineBotCallbackQuery => "updateInlineBotCallbackQuery",
            Self::UserStatus => "updateUserStatus",
            Self::BotInlineQuery => "updateBotInlineQuery",
            Self::MessagePoll => "updateMessagePoll",
            Self::BotInlineSend => "updateBotInlineSend",
            Self::ChatParticipant => "updateChatParticipant",
            Self::ChannelParticipant => "updateChannelParticipant",
            Self::BotChatInviteRequester => "updateBotChatInviteRequester",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for RawEventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for RawEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw Event
// ============================================================================

/// An undecoded update as produced by the transport.
///
/// The payload is opaque to the dispatcher; only the tag is inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    kind: RawEventKind,
    name: Cow<'static, str>,
    payload: Value,
}

impl RawEvent {
    /// Creates a raw event with a known tag.
    pub fn new(kind: RawEventKind, payload: Value) -> Self {
        Self {
            kind,
            name: Cow::Borrowed(kind.as_str()),
            payload,
        }
    }

    /// Creates a raw event from a constructor name, which may be unknown.
    pub fn named(name: impl Into<String>, payload: Value) -> Self {
        let name = name.into();
        match RawEventKind::from_name(&name) {
            RawEventKind::Unknown => Self {
                kind: RawEventKind::Unknown,
                name: Cow::Owned(name),
                payload,
            },
            kind => Self::new(kind, payload),
        }
    }

    /// Builds a raw event from a JSON object carrying its constructor name in
    /// the `"_"` field.
    ///
    /// ```rust,ignore
    /// let raw = RawEvent::from_value(json!({"_": "updateNewMessage", "message": {}}));
    /// assert_eq!(raw.kind(), RawEventKind::NewMessage);
    /// ```
    pub fn from_value(payload: Value) -> Self {
        let name = payload
            .get("_")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::named(name, payload)
    }

    /// Returns the tag of this event.
    pub fn kind(&self) -> RawEventKind {
        self.kind
    }

    /// Returns the constructor name, including for unknown tags.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the opaque payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the event and returns its payload.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Returns `true` for scheduled-message updates.
    ///
    /// Message parsers use this to flag the resulting message as scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.kind == RawEventKind::NewScheduledMessage
    }
}

// ============================================================================
// Event Category
// ============================================================================

/// Semantic classification of an update.
///
/// Every handler subscribes to exactly one category. [`EventCategory::Raw`]
/// handlers receive every update, unparsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCategory {
    NewMessage,
    EditedMessage,
    DeletedMessages,
    CallbackQuery,
    UserStatus,
    InlineQuery,
    Poll,
    ChosenInlineResult,
    ChatMemberUpdated,
    ChatJoinRequest,
    Raw,
}

impl EventCategory {
    /// Every category, raw last.
    pub const ALL: [EventCategory; 11] = [
        Self::NewMessage,
        Self::EditedMessage,
        Self::DeletedMessages,
        Self::CallbackQuery,
        Self::UserStatus,
        Self::InlineQuery,
        Self::Poll,
        Self::ChosenInlineResult,
        Self::ChatMemberUpdated,
        Self::ChatJoinRequest,
        Self::Raw,
    ];

    /// Returns the snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::EditedMessage => "edited_message",
            Self::DeletedMessages => "deleted_messages",
            Self::CallbackQuery => "callback_query",
            Self::UserStatus => "user_status",
            Self::InlineQuery => "inline_query",
            Self::Poll => "poll",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::ChatMemberUpdated => "chat_member_updated",
            Self::ChatJoinRequest => "chat_join_request",
            Self::Raw => "raw",
        }
    }

    /// Returns `true` for the catch-all raw category.
    pub fn is_raw(&self) -> bool {
        *self == Self::Raw
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parsed Update
// ============================================================================

/// A type-erased domain object produced by a parser.
///
/// Cloning is cheap; the object itself lives behind an `Arc`.
#[derive(Clone)]
pub struct ParsedUpdate {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ParsedUpdate {
    /// Wraps a parsed value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value without copying it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns `true` if the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the wrapped value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns a shared handle to the wrapped value as a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast().ok()
    }

    /// Returns the Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ParsedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedUpdate")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_str() {
        for kind in RawEventKind::KNOWN {
            assert_eq!(kind.as_str().parse::<RawEventKind>().unwrap(), kind);
        }
        assert_eq!(
            "updateReadHistoryInbox".parse::<RawEventKind>().unwrap(),
            RawEventKind::Unknown
        );
    }

    #[test]
    fn test_unknown_keeps_name() {
        let raw = RawEvent::from_value(json!({"_": "updateReadHistoryInbox", "max_id": 3}));
        assert_eq!(raw.kind(), RawEventKind::Unknown);
        assert_eq!(raw.name(), "updateReadHistoryInbox");
        assert_eq!(raw.payload()["max_id"], 3);
    }

    #[test]
    fn test_known_from_value() {
        let raw = RawEvent::from_value(json!({"_": "updateNewScheduledMessage"}));
        assert_eq!(raw.kind(), RawEventKind::NewScheduledMessage);
        assert!(raw.is_scheduled());
        assert_eq!(raw.name(), "updateNewScheduledMessage");
    }

    #[test]
    fn test_missing_constructor_is_unknown() {
        let raw = RawEvent::from_value(json!({"pts": 1}));
        assert_eq!(raw.kind(), RawEventKind::Unknown);
        assert_eq!(raw.name(), "");
    }

    #[test]
    fn test_parsed_update_downcast() {
        #[derive(Debug, PartialEq)]
        struct Message {
            text: String,
        }

        let parsed = ParsedUpdate::new(Message { text: "hi".into() });
        assert!(parsed.is::<Message>());
        assert!(!parsed.is::<String>());
        assert_eq!(parsed.downcast_ref::<Message>().unwrap().text, "hi");
        assert!(parsed.downcast::<Message>().is_some());
        assert!(parsed.type_name().ends_with("Message"));
    }
}
