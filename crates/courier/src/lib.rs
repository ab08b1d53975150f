//! # Courier
//!
//! A concurrent update dispatcher for chat clients.
//!
//! ## Overview
//!
//! A transport hands raw, tagged updates to the dispatcher. A pool of workers
//! classifies each update, parses it into a domain object and walks the
//! registered handler groups in ascending order.
//!
//! ```text
//! ┌───────────┐     ┌───────┐     ┌─────────────────────────────┐
//! │ Transport │────▶│ Queue │────▶│ Worker 0 ─▶ group 0, 1, ... │
//! │  (Client) │     │ (FIFO)│────▶│ Worker 1 ─▶ group 0, 1, ... │
//! └───────────┘     └───────┘────▶│ Worker N ─▶ group 0, 1, ... │
//!                                 └─────────────────────────────┘
//! ```
//!
//! - **Groups**: at most one handler per group runs for an update, unless a
//!   handler returns [`Propagation::Continue`](prelude::Propagation::Continue)
//! - **Propagation**: [`Propagation::Stop`](prelude::Propagation::Stop) ends
//!   dispatch for the update entirely
//! - **Errors**: failed handlers are routed to scoped error handlers by
//!   [`ErrorKind`](prelude::ErrorKind), then to the global one
//! - **Mutations**: adding or removing handlers pauses every worker between
//!   updates, so a dispatch never sees a half-applied change
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn echo(ctx: Arc<UpdateContext>) -> HandlerResult {
//!     if let Some(text) = ctx.parsed_as::<String>() {
//!         info!("echo: {text}");
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = UpdateDispatcher::builder()
//!         .parsers(ParserSet::new().with(EventCategory::NewMessage, parse_message))
//!         .build(client)?;
//!
//!     dispatcher.add_handler(on_message().handler(echo), DEFAULT_GROUP).await?;
//!     dispatcher.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `courier.toml` / `config.toml` (default)
//! - `yaml-config`: Load `courier.yaml` / `config.yaml`
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use courier_runtime::{
        DispatcherBuilder, DispatcherConfig, MutationHandle, RuntimeError, RuntimeResult,
        UpdateDispatcher, UpdateSender,
    };

    // Core types seen by handlers
    pub use courier_core::{
        BoxedClient, Client, EntityMaps, ErrorKind, EventCategory, HandlerError, HandlerResult,
        ParsedUpdate, RawEvent, RawEventKind, UpdateContext, downcast_client,
    };

    // Handler construction
    pub use courier_framework::{
        DEFAULT_GROUP, ErrorHandler, ErrorHandlerTarget, GlobalErrorPolicy, Handler,
        Propagation, RegistryError, UpdateHandler, on_callback_query, on_chat_join_request,
        on_chat_member_updated, on_chosen_inline_result, on_deleted_messages, on_edited_message,
        on_error, on_inline_query, on_message, on_poll, on_raw_update, on_user_status,
    };

    // Parsing
    pub use courier_framework::{Parser, ParserSet};

    // Logging macros
    pub use courier_runtime::prelude::*;
}
