//! # Courier Framework
//!
//! Handler-facing building blocks for the Courier update dispatcher.
//!
//! This layer provides:
//! - [`UpdateHandler`] and [`ErrorHandler`] with their builders
//! - `on_*` convenience functions, one per event category
//! - [`HandlerRegistry`], the ordered group map the workers iterate
//! - [`EventClassifier`] and the [`Parser`] seam for turning raw updates into
//!   domain objects
//! - [`ErrorRouter`], which delivers handler failures to error handlers
//!
//! Nothing here spawns tasks or owns a queue; that is the runtime's job.

pub mod builders;
pub mod callback;
pub mod classifier;
pub mod error_handler;
pub mod handler;
pub mod registry;
pub mod routing;

#[cfg(test)]
pub(crate) mod test_support;

pub use builders::{
    on_callback_query, on_chat_join_request, on_chat_member_updated, on_chosen_inline_result,
    on_deleted_messages, on_edited_message, on_error, on_inline_query, on_message, on_poll,
    on_raw_update, on_user_status,
};
pub use callback::{BoxFuture, IntoPropagation, Propagation};
pub use classifier::{
    BoxedParser, Classification, EventClassifier, Parser, ParserSet, PassthroughParser,
    TAG_GROUPS, category_of,
};
pub use error_handler::{ErrorHandler, ErrorHandlerBuilder};
pub use handler::{Handler, HandlerBuilder, RawHandlerBuilder, UpdateHandler};
pub use registry::{DEFAULT_GROUP, ErrorHandlerTarget, HandlerRegistry, RegistryError};
pub use routing::{ErrorRouter, GlobalErrorPolicy};
