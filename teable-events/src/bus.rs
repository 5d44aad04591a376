//! Broadcast bus for table events.

use crate::TableEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// In-process event bus.
///
/// Cloning is cheap; every clone publishes to the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TableEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    ///
    /// Slow subscribers that fall further behind miss events (lagged).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every subscriber.
    ///
    /// Returns the number of subscribers that received it. Publishing
    /// without subscribers drops the event.
    pub fn publish(&self, event: TableEvent) -> usize {
        let event_type = event.event_type();
        let table_id = event.table_id().clone();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(
                    event_type = event_type,
                    table_id = %table_id,
                    receivers = receivers,
                    "Published table event"
                );
                receivers
            }
            Err(_) => {
                debug!(event_type = event_type, table_id = %table_id, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CreatedRecord;

    fn event() -> TableEvent {
        TableEvent::RecordsCreated {
            table_id: "tblA".into(),
            records: vec![CreatedRecord {
                id: "rec1".into(),
                fields: Default::default(),
            }],
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(event()), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(event()), 2);
        assert_eq!(a.recv().await.unwrap(), event());
        assert_eq!(b.recv().await.unwrap(), event());
    }
}
