//! Per-update context shared by filters, handlers and error handlers.

use std::any::Any;
use std::sync::Arc;

use crate::client::BoxedClient;
use crate::entity::EntityMaps;
use crate::event::{EventCategory, ParsedUpdate, RawEvent};

/// Everything a handler may need to know about the update being dispatched.
///
/// A worker builds one context per update and shares it behind an `Arc` with
/// every filter and handler it visits. Category handlers usually read
/// [`parsed`](Self::parsed); raw handlers read [`raw`](Self::raw) and
/// [`entities`](Self::entities) instead.
///
/// # Example
///
/// ```rust,ignore
/// async fn on_text(ctx: Arc<UpdateContext>) -> HandlerResult {
///     if let Some(message) = ctx.parsed_as::<Message>() {
///         println!("{}: {}", ctx.client().name(), message.text);
///     }
///     Ok(())
/// }
/// ```
pub struct UpdateContext {
    client: BoxedClient,
    raw: Arc<RawEvent>,
    entities: Arc<EntityMaps>,
    category: EventCategory,
    parsed: Option<ParsedUpdate>,
}

impl UpdateContext {
    /// Creates a context for one update.
    pub fn new(
        client: BoxedClient,
        raw: Arc<RawEvent>,
        entities: Arc<EntityMaps>,
        category: EventCategory,
        parsed: Option<ParsedUpdate>,
    ) -> Self {
        Self {
            client,
            raw,
            entities,
            category,
            parsed,
        }
    }

    /// Returns the client that received the update.
    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    /// Returns the raw update.
    pub fn raw(&self) -> &RawEvent {
        &self.raw
    }

    /// Returns a shared handle to the raw update.
    pub fn raw_arc(&self) -> Arc<RawEvent> {
        Arc::clone(&self.raw)
    }

    /// Returns the users and chats that arrived with the update.
    pub fn entities(&self) -> &EntityMaps {
        &self.entities
    }

    /// Returns the category the classifier assigned.
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Returns the parsed object, or `None` for unclassified updates.
    pub fn parsed(&self) -> Option<&ParsedUpdate> {
        self.parsed.as_ref()
    }

    /// Borrows the parsed object as a concrete type.
    pub fn parsed_as<T: Any>(&self) -> Option<&T> {
        self.parsed.as_ref()?.downcast_ref()
    }
}

impl std::fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateContext")
            .field("client", &self.client.name())
            .field("update", &self.raw.name())
            .field("category", &self.category)
            .field("parsed", &self.parsed)
            .finish()
    }
}
