use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Per-room broadcast fan-out used by the SSE streams.
///
/// Channels are created on first subscription and dropped once a broadcast finds no
/// receiver left, or when the room is closed.
pub struct RoomHub {
    channels: DashMap<String, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl RoomHub {
    /// Hub whose per-room channels buffer up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber that will receive subsequent events of `code`.
    pub fn subscribe(&self, code: &str) -> broadcast::Receiver<ServerEvent> {
        self.channels
            .entry(code.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to the current subscribers of `code`, ignoring delivery errors.
    pub fn broadcast(&self, code: &str, event: ServerEvent) {
        let delivered = match self.channels.get(code) {
            Some(sender) => sender.send(event).is_ok(),
            None => return,
        };
        if !delivered {
            self.channels
                .remove_if(code, |_, sender| sender.receiver_count() == 0);
        }
    }

    /// Send a final event and drop the channel so subscriber streams end.
    pub fn close(&self, code: &str, event: ServerEvent) {
        if let Some((_, sender)) = self.channels.remove(code) {
            let _ = sender.send(event);
        }
    }

    /// Drop the channel of `code` if nobody listens to it anymore.
    pub fn release(&self, code: &str) {
        self.channels
            .remove_if(code, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of subscribers currently attached to `code`.
    pub fn subscriber_count(&self, code: &str) -> usize {
        self.channels
            .get(code)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> ServerEvent {
        ServerEvent {
            event: Some("room.updated".into()),
            data: data.into(),
        }
    }

    #[tokio::test]
    async fn events_reach_only_the_matching_room() {
        let hub = RoomHub::new(4);
        let mut first = hub.subscribe("AAAAAA");
        let mut second = hub.subscribe("BBBBBB");

        hub.broadcast("AAAAAA", event("a"));
        assert_eq!(first.recv().await.unwrap().data, "a");
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn abandoned_channels_are_dropped() {
        let hub = RoomHub::new(4);
        drop(hub.subscribe("AAAAAA"));
        hub.broadcast("AAAAAA", event("a"));
        assert_eq!(hub.subscriber_count("AAAAAA"), 0);
        assert!(hub.channels.is_empty());
    }

    #[tokio::test]
    async fn close_delivers_last_event_then_ends() {
        let hub = RoomHub::new(4);
        let mut receiver = hub.subscribe("AAAAAA");
        hub.close("AAAAAA", event("bye"));
        assert_eq!(receiver.recv().await.unwrap().data, "bye");
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
