use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::IngestMessage;

/// Bounded fire-and-forget ingestion channel.
///
/// `emit` never waits: when the channel is full or closed the message is
/// dropped and counted.
#[derive(Clone)]
pub struct ObserveBus {
    tx: mpsc::Sender<IngestMessage>,
    dropped: Arc<AtomicU64>,
}

impl ObserveBus {
    /// Create a bus with room for `capacity` pending messages.
    ///
    /// Returns the bus (for emitting) and the receiver the worker drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IngestMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Queue a message without waiting. Returns whether it was accepted.
    pub fn emit(&self, message: IngestMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(error) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "ingestion bus dropped a {} message ({} dropped so far)",
                    error.into_inner().kind(),
                    total
                );
                false
            }
        }
    }

    /// Number of messages dropped since the bus was created.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Duration};

    use super::*;
    use crate::types::EventInput;

    fn message(action: &str) -> IngestMessage {
        IngestMessage::Event(EventInput {
            event_type: "Metric".to_string(),
            source_app: "hivemind-v3".to_string(),
            action: action.to_string(),
            ..EventInput::default()
        })
    }

    #[tokio::test]
    async fn emitted_message_reaches_receiver() {
        let (bus, mut rx) = ObserveBus::new(4);
        assert!(bus.emit(message("tick")));

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("should receive message")
            .expect("message should exist");

        match received {
            IngestMessage::Event(input) => assert_eq!(input.action, "tick"),
            other => panic!("wrong message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn full_bus_drops_and_counts() {
        let (bus, _rx) = ObserveBus::new(1);

        assert!(bus.emit(message("first")));
        assert!(!bus.emit(message("second")));
        assert!(!bus.emit(message("third")));

        assert_eq!(bus.dropped_count(), 2);
    }

    #[test]
    fn clones_share_the_drop_counter() {
        let (bus, rx) = ObserveBus::new(1);
        let other = bus.clone();
        drop(rx);

        assert!(bus.is_closed());
        assert!(!other.emit(message("late")));
        assert_eq!(bus.dropped_count(), 1);
    }
}
