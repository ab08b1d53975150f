//! The update queue between the transport and the workers.
//!
//! An unbounded multi-producer channel. All workers share the single receiver
//! behind an async mutex, so each update is taken by exactly one worker.

use std::sync::Arc;

use courier_core::{EntityMaps, RawEvent};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

use crate::error::{RuntimeError, RuntimeResult};

pub(crate) enum Packet {
    Update {
        raw: RawEvent,
        entities: Arc<EntityMaps>,
    },
    /// Ends exactly one worker.
    Shutdown,
}

pub(crate) type SharedReceiver = Arc<Mutex<UnboundedReceiver<Packet>>>;

/// Enqueues raw updates for dispatch.
///
/// Cheap to clone; hand one to each transport task.
#[derive(Clone)]
pub struct UpdateSender {
    tx: UnboundedSender<Packet>,
    discard: bool,
}

impl UpdateSender {
    /// Enqueues one update with the entities that arrived alongside it.
    ///
    /// Updates are silently discarded when the dispatcher was configured with
    /// `no_updates`.
    pub fn send(&self, raw: RawEvent, entities: impl Into<Arc<EntityMaps>>) -> RuntimeResult<()> {
        if self.discard {
            trace!(update = raw.name(), "Updates disabled, discarding");
            return Ok(());
        }
        self.tx
            .send(Packet::Update {
                raw,
                entities: entities.into(),
            })
            .map_err(|_| RuntimeError::QueueClosed)
    }

    pub(crate) fn shutdown_one(&self) -> RuntimeResult<()> {
        self.tx
            .send(Packet::Shutdown)
            .map_err(|_| RuntimeError::QueueClosed)
    }

    /// Returns `true` once the dispatcher has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for UpdateSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSender")
            .field("closed", &self.is_closed())
            .field("discard", &self.discard)
            .finish()
    }
}

pub(crate) fn channel(discard: bool) -> (UpdateSender, SharedReceiver) {
    let (tx, rx) = unbounded_channel();
    (UpdateSender { tx, discard }, Arc::new(Mutex::new(rx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::RawEventKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_and_sentinel() {
        let (sender, receiver) = channel(false);
        sender
            .send(RawEvent::new(RawEventKind::UserStatus, json!({"n": 1})), EntityMaps::default())
            .unwrap();
        sender.shutdown_one().unwrap();

        let mut rx = receiver.lock().await;
        assert!(matches!(
            rx.recv().await,
            Some(Packet::Update { raw, .. }) if raw.payload()["n"] == 1
        ));
        assert!(matches!(rx.recv().await, Some(Packet::Shutdown)));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (sender, receiver) = channel(false);
        drop(receiver);
        assert!(sender.is_closed());
        assert!(matches!(
            sender.send(RawEvent::named("updatePts", json!({})), EntityMaps::default()),
            Err(RuntimeError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_discarding_sender() {
        let (sender, receiver) = channel(true);
        sender
            .send(RawEvent::named("updatePts", json!({})), EntityMaps::default())
            .unwrap();
        assert!(receiver.lock().await.try_recv().is_err());
    }
}
