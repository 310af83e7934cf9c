use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-groomer change feed. Anything showing a groomer's availability
/// subscribes here and re-queries when an event arrives.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, groomer_id: Ulid) -> broadcast::Receiver<Event> {
        self.channels
            .entry(groomer_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, groomer_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&groomer_id) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn subscriber_count(&self, groomer_id: &Ulid) -> usize {
        self.channels
            .get(groomer_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
