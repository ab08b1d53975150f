//! The handler registry.
//!
//! Handlers live in groups keyed by an `i32` priority. Groups are visited in
//! ascending key order and handlers inside a group in insertion order. Error
//! handlers are tracked separately: an ordered list of scoped handlers and one
//! optional global slot.
//!
//! The registry itself is a plain value. Concurrency lives one layer up: the
//! runtime keeps it behind an `Arc`, hands snapshots to workers, and mutates a
//! copy with `Arc::make_mut` while dispatch is paused.

use std::collections::BTreeMap;

use courier_core::ErrorKind;
use thiserror::Error;

use crate::error_handler::ErrorHandler;
use crate::handler::{Handler, UpdateHandler};

/// The group used when a caller does not pick one.
pub const DEFAULT_GROUP: i32 = 0;

/// Errors returned by registry mutations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The named group has never been created.
    #[error("group {0} does not exist")]
    GroupNotFound(i32),

    /// The handler is not a member of the named group.
    #[error("handler not found in group {group}")]
    HandlerNotFound {
        /// The group that was searched.
        group: i32,
    },

    /// The error handler is neither scoped nor global.
    #[error("error handler is not registered")]
    ErrorHandlerNotFound,

    /// No scoped error handler reacts to this kind.
    #[error("no error handler registered for kind '{0}'")]
    NoErrorHandlerForKind(ErrorKind),

    /// The dispatcher went away before the mutation ran.
    #[error("dispatcher dropped before the mutation completed")]
    DispatcherGone,

    /// A mutation handle was awaited from inside a handler.
    ///
    /// The mutation still applies once the current dispatch finishes.
    #[error("mutation awaited from a handler running on worker {worker}")]
    AwaitedFromHandler {
        /// The worker running the handler.
        worker: usize,
    },
}

/// Selects the error handler to remove.
#[derive(Debug, Clone)]
pub enum ErrorHandlerTarget {
    /// This exact handler, scoped or global.
    Handler(ErrorHandler),
    /// The first scoped handler reacting to this kind.
    Kind(ErrorKind),
    /// Whatever sits in the global slot.
    Global,
}

impl From<ErrorHandler> for ErrorHandlerTarget {
    fn from(handler: ErrorHandler) -> Self {
        Self::Handler(handler)
    }
}

impl From<ErrorKind> for ErrorHandlerTarget {
    fn from(kind: ErrorKind) -> Self {
        Self::Kind(kind)
    }
}

/// Registered handlers, grouped and ordered.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    groups: BTreeMap<i32, Vec<Handler>>,
    scoped_errors: Vec<ErrorHandler>,
    global_error: Option<ErrorHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to `group`, creating the group if needed.
    ///
    /// An error handler added this way is also registered for error routing;
    /// its group entry is never selected during dispatch.
    pub fn add(&mut self, handler: impl Into<Handler>, group: i32) {
        let handler = handler.into();
        if let Handler::Error(error_handler) = &handler {
            self.add_error_handler(error_handler.clone());
        }
        self.groups.entry(group).or_default().push(handler);
    }

    /// Registers an error handler for routing.
    ///
    /// A global handler replaces the previous one; a scoped handler is
    /// appended to the scoped list.
    pub fn add_error_handler(&mut self, handler: ErrorHandler) {
        if handler.is_global() {
            self.global_error = Some(handler);
        } else {
            self.scoped_errors.push(handler);
        }
    }

    /// Removes the first instance of `handler` from `group`.
    ///
    /// The registry is unchanged when this fails.
    pub fn remove(&mut self, handler: &Handler, group: i32) -> Result<(), RegistryError> {
        let handlers = self
            .groups
            .get_mut(&group)
            .ok_or(RegistryError::GroupNotFound(group))?;
        let index = handlers
            .iter()
            .position(|h| h == handler)
            .ok_or(RegistryError::HandlerNotFound { group })?;
        handlers.remove(index);
        Ok(())
    }

    /// Unregisters an error handler.
    ///
    /// Group entries pointing at the removed handler are pruned as well.
    /// Clearing the global slot succeeds even when it is already empty.
    pub fn remove_error_handler(
        &mut self,
        target: &ErrorHandlerTarget,
    ) -> Result<(), RegistryError> {
        let removed = match target {
            ErrorHandlerTarget::Handler(handler) => {
                if let Some(index) = self.scoped_errors.iter().position(|h| h == handler) {
                    self.scoped_errors.remove(index)
                } else if self.global_error.as_ref() == Some(handler) {
                    self.global_error.take().ok_or(RegistryError::ErrorHandlerNotFound)?
                } else {
                    return Err(RegistryError::ErrorHandlerNotFound);
                }
            }
            ErrorHandlerTarget::Kind(kind) => {
                let index = self
                    .scoped_errors
                    .iter()
                    .position(|h| h.handles(kind))
                    .ok_or_else(|| RegistryError::NoErrorHandlerForKind(kind.clone()))?;
                self.scoped_errors.remove(index)
            }
            ErrorHandlerTarget::Global => match self.global_error.take() {
                Some(handler) => handler,
                None => return Ok(()),
            },
        };

        let removed = Handler::Error(removed);
        for handlers in self.groups.values_mut() {
            handlers.retain(|h| h != &removed);
        }
        Ok(())
    }

    /// Iterates groups in ascending key order.
    pub fn groups(&self) -> impl Iterator<Item = (i32, &[Handler])> {
        self.groups.iter().map(|(key, handlers)| (*key, handlers.as_slice()))
    }

    /// Returns the group keys in dispatch order.
    pub fn group_keys(&self) -> Vec<i32> {
        self.groups.keys().copied().collect()
    }

    /// Returns the number of entries in `group`, or `None` if it does not exist.
    pub fn group_len(&self, group: i32) -> Option<usize> {
        self.groups.get(&group).map(Vec::len)
    }

    /// Returns `true` if `handler` is a member of `group`.
    pub fn contains(&self, handler: &UpdateHandler, group: i32) -> bool {
        self.groups
            .get(&group)
            .is_some_and(|handlers| handlers.iter().any(|h| h.as_update() == Some(handler)))
    }

    /// Scoped error handlers, in registration order.
    pub fn scoped_error_handlers(&self) -> &[ErrorHandler] {
        &self.scoped_errors
    }

    pub fn global_error_handler(&self) -> Option<&ErrorHandler> {
        self.global_error.as_ref()
    }

    /// Drops every group. Error handlers stay registered for routing.
    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Returns `true` when nothing at all is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
            && self.scoped_errors.is_empty()
            && self.global_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{on_error, on_message, on_poll};
    use tokio_test::{assert_err, assert_ok};

    fn noop() -> UpdateHandler {
        on_message().handler(|_| async {})
    }

    #[test]
    fn test_groups_sorted() {
        let mut registry = HandlerRegistry::new();
        for group in [0, 5, 5, 2, -3] {
            registry.add(noop(), group);
        }

        assert_eq!(registry.group_keys(), vec![-3, 0, 2, 5]);
        assert_eq!(registry.group_len(5), Some(2));
        assert_eq!(registry.group_len(7), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut registry = HandlerRegistry::new();
        let first = noop();
        let second = on_poll().handler(|_| async {});
        registry.add(first.clone(), DEFAULT_GROUP);
        registry.add(second.clone(), DEFAULT_GROUP);

        let (_, handlers) = registry.groups().next().unwrap();
        assert_eq!(handlers[0].as_update(), Some(&first));
        assert_eq!(handlers[1].as_update(), Some(&second));
    }

    #[test]
    fn test_remove_first_instance_only() {
        let mut registry = HandlerRegistry::new();
        let handler = noop();
        registry.add(handler.clone(), 1);
        registry.add(handler.clone(), 1);

        assert_ok!(registry.remove(&handler.clone().into(), 1));
        assert_eq!(registry.group_len(1), Some(1));
        assert!(registry.contains(&handler, 1));
    }

    #[test]
    fn test_remove_unknown_leaves_registry_unchanged() {
        let mut registry = HandlerRegistry::new();
        let registered = noop();
        registry.add(registered.clone(), 0);

        let stranger: Handler = noop().into();
        assert_eq!(
            assert_err!(registry.remove(&stranger, 0)),
            RegistryError::HandlerNotFound { group: 0 }
        );
        assert_eq!(
            assert_err!(registry.remove(&stranger, 9)),
            RegistryError::GroupNotFound(9)
        );
        assert_eq!(registry.group_keys(), vec![0]);
        assert!(registry.contains(&registered, 0));
    }

    #[test]
    fn test_error_handler_slots() {
        let mut registry = HandlerRegistry::new();
        let first_global = on_error([]).handler(|_, _| async {});
        let second_global = on_error([]).handler(|_, _| async {});
        let flood = on_error([ErrorKind::Flood]).handler(|_, _| async {});

        registry.add_error_handler(first_global);
        registry.add_error_handler(second_global.clone());
        registry.add(flood.clone(), 3);

        assert_eq!(registry.global_error_handler(), Some(&second_global));
        assert_eq!(registry.scoped_error_handlers(), &[flood.clone()]);
        assert_eq!(registry.group_len(3), Some(1));

        assert_ok!(registry.remove_error_handler(&flood.into()));
        assert!(registry.scoped_error_handlers().is_empty());
        assert_eq!(registry.group_len(3), Some(0));
    }

    #[test]
    fn test_remove_error_handler_by_kind() {
        let mut registry = HandlerRegistry::new();
        let a = on_error([ErrorKind::Timeout, ErrorKind::Network]).handler(|_, _| async {});
        let b = on_error([ErrorKind::Network]).handler(|_, _| async {});
        registry.add_error_handler(a);
        registry.add_error_handler(b.clone());

        assert_ok!(registry.remove_error_handler(&ErrorKind::Network.into()));
        assert_eq!(registry.scoped_error_handlers(), &[b]);
        assert_eq!(
            assert_err!(registry.remove_error_handler(&ErrorKind::Parse.into())),
            RegistryError::NoErrorHandlerForKind(ErrorKind::Parse)
        );
    }

    #[test]
    fn test_remove_global() {
        let mut registry = HandlerRegistry::new();
        let global = on_error([]).handler(|_, _| async {});
        registry.add_error_handler(global.clone());

        assert_ok!(registry.remove_error_handler(&ErrorHandlerTarget::Global));
        assert!(registry.global_error_handler().is_none());
        assert_ok!(registry.remove_error_handler(&ErrorHandlerTarget::Global));
        assert_eq!(
            assert_err!(registry.remove_error_handler(&global.into())),
            RegistryError::ErrorHandlerNotFound
        );
    }

    #[test]
    fn test_clear_groups() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry.add(noop(), 0);
        registry.add(on_error([ErrorKind::Parse]).handler(|_, _| async {}), 1);

        registry.clear_groups();
        assert!(registry.group_keys().is_empty());
        assert_eq!(registry.scoped_error_handlers().len(), 1);
        assert!(!registry.is_empty());
    }
}
