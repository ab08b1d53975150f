//! Handler builder functions for each event category.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_framework::{on_message, on_raw_update, on_error};
//!
//! dispatcher.add_handler(on_message().handler(echo), 0);
//! dispatcher.add_handler(on_raw_update().handler(audit), -1);
//! dispatcher.add_error_handler(on_error([ErrorKind::Flood]).handler(backoff));
//! ```

use courier_core::{ErrorKind, EventCategory};

use crate::error_handler::ErrorHandlerBuilder;
use crate::handler::{HandlerBuilder, RawHandlerBuilder};

/// New messages, including channel posts and scheduled messages.
pub fn on_message() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::NewMessage)
}

/// Edited messages and channel posts.
pub fn on_edited_message() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::EditedMessage)
}

/// Deleted messages and channel posts.
pub fn on_deleted_messages() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::DeletedMessages)
}

/// Callback queries from regular and inline messages.
pub fn on_callback_query() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::CallbackQuery)
}

pub fn on_user_status() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::UserStatus)
}

pub fn on_inline_query() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::InlineQuery)
}

pub fn on_poll() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::Poll)
}

/// Inline results a user picked and sent.
pub fn on_chosen_inline_result() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::ChosenInlineResult)
}

/// Membership changes in groups and channels.
pub fn on_chat_member_updated() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::ChatMemberUpdated)
}

pub fn on_chat_join_request() -> HandlerBuilder {
    HandlerBuilder::new(EventCategory::ChatJoinRequest)
}

/// Every update, unparsed.
pub fn on_raw_update() -> RawHandlerBuilder {
    RawHandlerBuilder::new()
}

/// Errors of the given kinds; pass no kinds for the global handler.
pub fn on_error(kinds: impl IntoIterator<Item = ErrorKind>) -> ErrorHandlerBuilder {
    ErrorHandlerBuilder::new(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_categories() {
        let builders = [
            (on_message(), EventCategory::NewMessage),
            (on_edited_message(), EventCategory::EditedMessage),
            (on_deleted_messages(), EventCategory::DeletedMessages),
            (on_callback_query(), EventCategory::CallbackQuery),
            (on_user_status(), EventCategory::UserStatus),
            (on_inline_query(), EventCategory::InlineQuery),
            (on_poll(), EventCategory::Poll),
            (on_chosen_inline_result(), EventCategory::ChosenInlineResult),
            (on_chat_member_updated(), EventCategory::ChatMemberUpdated),
            (on_chat_join_request(), EventCategory::ChatJoinRequest),
        ];

        for (builder, category) in builders {
            assert_eq!(builder.handler(|_| async {}).category(), category);
        }
        let raw = on_raw_update().handler(|_| async {});
        assert_eq!(raw.category(), EventCategory::Raw);
        assert!(raw.is_raw());
    }

    #[test]
    fn test_on_error_without_kinds_is_global() {
        assert!(on_error([]).handler(|_, _| async {}).is_global());
        assert!(!on_error([ErrorKind::Parse]).handler(|_, _| async {}).is_global());
    }
}
