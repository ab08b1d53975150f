//! Shared fixtures for unit tests.

use std::any::Any;
use std::sync::Arc;

use courier_core::{
    BoxedClient, Client, EntityMaps, EventCategory, RawEvent, RawEventKind, UpdateContext,
};

pub(crate) struct NullClient;

impl Client for NullClient {
    fn name(&self) -> &str {
        "null"
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) fn client() -> BoxedClient {
    Arc::new(NullClient)
}

/// A new-message context whose entity maps hold the given users.
pub(crate) fn message_context(users: &[i64]) -> Arc<UpdateContext> {
    let entities = users.iter().fold(EntityMaps::default(), |maps, id| {
        maps.with_user(*id, serde_json::json!({}))
    });
    Arc::new(UpdateContext::new(
        client(),
        Arc::new(RawEvent::new(RawEventKind::NewMessage, serde_json::json!({}))),
        Arc::new(entities),
        EventCategory::NewMessage,
        None,
    ))
}
