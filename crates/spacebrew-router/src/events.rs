//! Router events for observers
//!
//! Events go out on a broadcast channel. Emitting never blocks; a receiver
//! that falls behind loses the oldest events instead of slowing dispatch.

use serde::Serialize;
use spacebrew_core::ClientDescriptor;
use tokio::sync::broadcast;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouterEvent {
    /// A registration was accepted
    ClientAccepted { client: ClientDescriptor },
    /// A registration was refused by the registry
    ClientRejected { name: String, reason: String },
    /// A registration announcement could not be parsed
    RegistrationInvalid { payload: String, reason: String },
    /// A message was forwarded along a route
    RouteFired { publisher: String, subscriber: String },
    /// Any message seen on the transport
    Message { topic: String, message: String },
}

/// Producer side of the event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RouterEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send an event; a bus with no receivers drops it
    pub fn emit(&self, event: RouterEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_receivers() {
        let bus = EventBus::new(4);
        bus.emit(RouterEvent::Message {
            topic: "t".to_string(),
            message: "m".to_string(),
        });
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_lagging_receiver_does_not_block() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(RouterEvent::RouteFired {
                publisher: format!("p{}", i),
                subscriber: "s".to_string(),
            });
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(3))
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(RouterEvent::RouteFired { publisher, .. }) if publisher == "p3"
        ));
    }

    #[test]
    fn test_event_json_shape() {
        let event = RouterEvent::RouteFired {
            publisher: "a".to_string(),
            subscriber: "b".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "route_fired");
        assert_eq!(json["publisher"], "a");
    }
}
