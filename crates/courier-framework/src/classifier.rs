//! Event classification and parser lookup.
//!
//! Every known [`RawEventKind`] belongs to exactly one [`EventCategory`]. The
//! [`EventClassifier`] resolves a raw update to its category and to the
//! [`Parser`] that turns it into a domain object. The lookup table is built
//! once, when the classifier is constructed; classification itself never
//! fails.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::{
    BoxedClient, EntityMaps, EventCategory, HandlerResult, ParsedUpdate, RawEvent, RawEventKind,
};

// ============================================================================
// Parser
// ============================================================================

/// Converts a raw update into a domain object.
///
/// Implemented for async closures taking `(client, raw, entities)`:
///
/// ```rust,ignore
/// async fn parse_message(
///     _client: BoxedClient,
///     raw: Arc<RawEvent>,
///     entities: Arc<EntityMaps>,
/// ) -> HandlerResult<ParsedUpdate> {
///     Ok(ParsedUpdate::new(Message::decode(&raw, &entities)?))
/// }
///
/// let parsers = ParserSet::new().with(EventCategory::NewMessage, parse_message);
/// ```
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(
        &self,
        client: BoxedClient,
        raw: Arc<RawEvent>,
        entities: Arc<EntityMaps>,
    ) -> HandlerResult<ParsedUpdate>;
}

#[async_trait]
impl<F, Fut> Parser for F
where
    F: Fn(BoxedClient, Arc<RawEvent>, Arc<EntityMaps>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<ParsedUpdate>> + Send + 'static,
{
    async fn parse(
        &self,
        client: BoxedClient,
        raw: Arc<RawEvent>,
        entities: Arc<EntityMaps>,
    ) -> HandlerResult<ParsedUpdate> {
        self(client, raw, entities).await
    }
}

/// A shared, type-erased parser.
pub type BoxedParser = Arc<dyn Parser>;

/// Parser used for categories nobody registered one for.
///
/// Wraps the raw event itself, so handlers can read it back with
/// `ctx.parsed_as::<RawEvent>()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughParser;

#[async_trait]
impl Parser for PassthroughParser {
    async fn parse(
        &self,
        _client: BoxedClient,
        raw: Arc<RawEvent>,
        _entities: Arc<EntityMaps>,
    ) -> HandlerResult<ParsedUpdate> {
        Ok(ParsedUpdate::from_arc(raw))
    }
}

// ============================================================================
// ParserSet
// ============================================================================

/// One parser per non-raw category.
#[derive(Clone, Default)]
pub struct ParserSet {
    parsers: HashMap<EventCategory, BoxedParser>,
}

impl ParserSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parser (builder pattern).
    pub fn with(mut self, category: EventCategory, parser: impl Parser + 'static) -> Self {
        self.insert(category, Arc::new(parser));
        self
    }

    /// Registers a parser, replacing any previous one for `category`.
    ///
    /// Raw updates are never parsed, so a parser for
    /// [`EventCategory::Raw`] is ignored.
    pub fn insert(&mut self, category: EventCategory, parser: BoxedParser) {
        if category.is_raw() {
            warn!("Ignoring parser registered for the raw category");
            return;
        }
        self.parsers.insert(category, parser);
    }

    pub fn get(&self, category: EventCategory) -> Option<&BoxedParser> {
        self.parsers.get(&category)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl std::fmt::Debug for ParserSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut categories: Vec<_> = self.parsers.keys().collect();
        categories.sort();
        f.debug_struct("ParserSet")
            .field("categories", &categories)
            .finish()
    }
}

// ============================================================================
// Classification
// ============================================================================

/// The raw tags belonging to each parsed category.
pub const TAG_GROUPS: &[(EventCategory, &[RawEventKind])] = &[
    (
        EventCategory::NewMessage,
        &[
            RawEventKind::NewMessage,
            RawEventKind::NewChannelMessage,
            RawEventKind::NewScheduledMessage,
        ],
    ),
    (
        EventCategory::EditedMessage,
        &[RawEventKind::EditMessage, RawEventKind::EditChannelMessage],
    ),
    (
        EventCategory::DeletedMessages,
        &[
            RawEventKind::DeleteMessages,
            RawEventKind::DeleteChannelMessages,
        ],
    ),
    (
        EventCategory::CallbackQuery,
        &[
            RawEventKind::BotCallbackQuery,
            RawEventKind::InlineBotCallbackQuery,
        ],
    ),
    (EventCategory::UserStatus, &[RawEventKind::UserStatus]),
    (EventCategory::InlineQuery, &[RawEventKind::BotInlineQuery]),
    (EventCategory::Poll, &[RawEventKind::MessagePoll]),
    (
        EventCategory::ChosenInlineResult,
        &[RawEventKind::BotInlineSend],
    ),
    (
        EventCategory::ChatMemberUpdated,
        &[
            RawEventKind::ChatParticipant,
            RawEventKind::ChannelParticipant,
        ],
    ),
    (
        EventCategory::ChatJoinRequest,
        &[RawEventKind::BotChatInviteRequester],
    ),
];

/// Returns the category a raw tag belongs to.
pub fn category_of(kind: RawEventKind) -> EventCategory {
    TAG_GROUPS
        .iter()
        .find(|(_, kinds)| kinds.contains(&kind))
        .map_or(EventCategory::Raw, |(category, _)| *category)
}

/// The outcome of classifying one raw update.
#[derive(Clone)]
pub struct Classification {
    pub category: EventCategory,
    /// `None` for unknown tags, which are delivered unparsed.
    pub parser: Option<BoxedParser>,
}

impl std::fmt::Debug for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classification")
            .field("category", &self.category)
            .field("has_parser", &self.parser.is_some())
            .finish()
    }
}

/// Maps raw tags to categories and parsers.
pub struct EventClassifier {
    table: HashMap<RawEventKind, (EventCategory, BoxedParser)>,
}

impl EventClassifier {
    /// Builds the lookup table from the registered parsers.
    ///
    /// Categories without a parser fall back to [`PassthroughParser`].
    pub fn new(parsers: ParserSet) -> Self {
        let passthrough: BoxedParser = Arc::new(PassthroughParser);
        let mut table = HashMap::new();

        for (category, kinds) in TAG_GROUPS {
            let parser = match parsers.get(*category) {
                Some(parser) => Arc::clone(parser),
                None => {
                    debug!(category = %category, "No parser registered, passing raw event through");
                    Arc::clone(&passthrough)
                }
            };
            for kind in kinds.iter() {
                table.insert(*kind, (*category, Arc::clone(&parser)));
            }
        }

        Self { table }
    }

    /// Resolves the category and parser for `raw`.
    pub fn classify(&self, raw: &RawEvent) -> Classification {
        match self.table.get(&raw.kind()) {
            Some((category, parser)) => Classification {
                category: *category,
                parser: Some(Arc::clone(parser)),
            },
            None => Classification {
                category: EventCategory::Raw,
                parser: None,
            },
        }
    }
}

impl std::fmt::Debug for EventClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClassifier")
            .field("kinds", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::client;
    use courier_core::HandlerError;
    use serde_json::json;

    #[test]
    fn test_every_known_tag_has_one_category() {
        for kind in RawEventKind::KNOWN {
            let owners = TAG_GROUPS
                .iter()
                .filter(|(_, kinds)| kinds.contains(&kind))
                .count();
            assert_eq!(owners, 1, "{kind} must belong to exactly one category");
            assert!(!category_of(kind).is_raw());
        }
        assert_eq!(category_of(RawEventKind::Unknown), EventCategory::Raw);
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            category_of(RawEventKind::NewScheduledMessage),
            EventCategory::NewMessage
        );
        assert_eq!(
            category_of(RawEventKind::InlineBotCallbackQuery),
            EventCategory::CallbackQuery
        );
        assert_eq!(
            category_of(RawEventKind::ChannelParticipant),
            EventCategory::ChatMemberUpdated
        );
        assert_eq!(
            category_of(RawEventKind::BotInlineSend),
            EventCategory::ChosenInlineResult
        );
    }

    #[test]
    fn test_unknown_tag_has_no_parser() {
        let classifier = EventClassifier::new(ParserSet::new());
        let classification = classifier.classify(&RawEvent::named("updateFolderPeers", json!({})));
        assert_eq!(classification.category, EventCategory::Raw);
        assert!(classification.parser.is_none());
    }

    #[tokio::test]
    async fn test_registered_parser_is_used() {
        let parsers = ParserSet::new().with(
            EventCategory::Poll,
            |_client: BoxedClient, raw: Arc<RawEvent>, _entities: Arc<EntityMaps>| async move {
                Ok::<_, HandlerError>(ParsedUpdate::new(raw.payload()["question"].to_string()))
            },
        );
        let classifier = EventClassifier::new(parsers);
        let raw = Arc::new(RawEvent::new(
            RawEventKind::MessagePoll,
            json!({"question": "tabs?"}),
        ));

        let classification = classifier.classify(&raw);
        assert_eq!(classification.category, EventCategory::Poll);

        let parsed = classification
            .parser
            .unwrap()
            .parse(client(), raw, Arc::default())
            .await
            .unwrap();
        assert_eq!(parsed.downcast_ref::<String>().unwrap(), "\"tabs?\"");
    }

    #[tokio::test]
    async fn test_passthrough_fallback() {
        let classifier = EventClassifier::new(ParserSet::new());
        let raw = Arc::new(RawEvent::new(RawEventKind::UserStatus, json!({"user_id": 5})));

        let parser = classifier.classify(&raw).parser.unwrap();
        let parsed = parser
            .parse(client(), Arc::clone(&raw), Arc::default())
            .await
            .unwrap();
        assert_eq!(parsed.downcast_ref::<RawEvent>(), Some(raw.as_ref()));
    }

    #[test]
    fn test_raw_parser_ignored() {
        let parsers = ParserSet::new().with(EventCategory::Raw, PassthroughParser);
        assert!(parsers.is_empty());
    }
}
