//! # Courier Core
//!
//! Foundation types shared by every layer of the Courier update dispatcher.
//!
//! This crate provides:
//! - **Raw updates**: transport-tagged records ([`RawEvent`], [`RawEventKind`])
//!   plus the entity maps that travel with them ([`EntityMaps`])
//! - **Classification**: the semantic [`EventCategory`] a handler subscribes to
//! - **Parsed updates**: type-erased domain objects ([`ParsedUpdate`])
//! - **Context**: the per-update [`UpdateContext`] handed to filters and handlers
//! - **Errors**: [`HandlerError`] tagged with an explicit [`ErrorKind`]
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌──────────────┐     ┌──────────┐
//! │ Transport │────▶│  RawEvent  │────▶│ ParsedUpdate │────▶│ Handlers │
//! └───────────┘     │ EntityMaps │     │  (category)  │     └──────────┘
//!                   └────────────┘     └──────────────┘
//! ```

pub mod client;
pub mod context;
pub mod entity;
pub mod error;
pub mod event;

pub use client::{BoxedClient, Client, downcast_client};
pub use context::UpdateContext;
pub use entity::{ChatId, EntityMaps, UserId};
pub use error::{ErrorKind, HandlerError, HandlerResult, guarded};
pub use event::{EventCategory, ParsedUpdate, RawEvent, RawEventKind};
