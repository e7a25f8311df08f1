//! Per-Runner event channel.
//!
//! A thin wrapper over a tokio broadcast channel. Every subscriber sees
//! events in the order they were sent. Sending never blocks and never
//! fails: with no subscribers the event is simply dropped, and a slow
//! subscriber that falls more than `capacity` events behind observes a
//! `Lagged` error instead of stalling the Runner.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::stream_event::RunnerEvent;

pub struct EventChannel {
    tx: broadcast::Sender<RunnerEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn send(&self, event: RunnerEvent) {
        tracing::trace!(event = event.event_type(), "Emitting event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`.
    pub fn stream(&self) -> BroadcastStream<RunnerEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
