//! Inbound message dispatch
//!
//! Every message the transport delivers goes through [`Dispatcher::dispatch`]:
//!
//! 1. On the registration topic, the payload is parsed and offered to the
//!    client registry.
//! 2. Independently, the topic is looked up in the route table and the
//!    payload is republished unchanged on a hit.
//! 3. The message is offered to observers.
//!
//! No table lock is held while publishing or emitting events.

use bytes::Bytes;
use spacebrew_core::{parse_registration, ParseError};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    events::{EventBus, RouterEvent},
    registry::ClientRegistry,
    routes::RouteTable,
    transport::Transport,
    RouterError,
};

/// What happened to a registration announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Accepted { name: String },
    Rejected { name: String },
    Invalid(ParseError),
}

/// What dispatching one message did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub registration: Option<RegistrationOutcome>,
    /// Subscriber topic the payload was published to
    pub forwarded_to: Option<String>,
    /// Set when a route matched but the publish failed
    pub publish_error: Option<String>,
}

pub struct Dispatcher {
    routes: Arc<RouteTable>,
    registry: Arc<ClientRegistry>,
    transport: Arc<dyn Transport>,
    events: EventBus,
    registration_topic: String,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        registry: Arc<ClientRegistry>,
        transport: Arc<dyn Transport>,
        events: EventBus,
        registration_topic: impl Into<String>,
    ) -> Self {
        Self {
            routes,
            registry,
            transport,
            events,
            registration_topic: registration_topic.into(),
        }
    }

    pub fn registration_topic(&self) -> &str {
        &self.registration_topic
    }

    /// Handle one inbound message
    pub fn dispatch(&self, topic: &str, payload: Bytes) -> DispatchReport {
        let text = String::from_utf8_lossy(&payload).into_owned();
        debug!("Received `{}` from `{}` topic", text, topic);

        let mut report = DispatchReport::default();

        if topic == self.registration_topic {
            report.registration = Some(self.handle_registration(&text));
        }

        if let Some(subscriber) = self.routes.lookup(topic) {
            match self.transport.publish(&subscriber, payload) {
                Ok(()) => {
                    debug!("Forwarded {} -> {}", topic, subscriber);
                    self.events.emit(RouterEvent::RouteFired {
                        publisher: topic.to_string(),
                        subscriber: subscriber.clone(),
                    });
                    report.forwarded_to = Some(subscriber);
                }
                Err(e) => {
                    error!("Failed to forward {} -> {}: {}", topic, subscriber, e);
                    report.publish_error = Some(e.to_string());
                }
            }
        }

        self.events.emit(RouterEvent::Message {
            topic: topic.to_string(),
            message: text,
        });

        report
    }

    fn handle_registration(&self, announcement: &str) -> RegistrationOutcome {
        let descriptor = match parse_registration(announcement) {
            Ok(registration) => registration.into_descriptor(),
            Err(e) => {
                warn!("Error processing registration '{}': {}", announcement, e);
                self.events.emit(RouterEvent::RegistrationInvalid {
                    payload: announcement.to_string(),
                    reason: e.to_string(),
                });
                return RegistrationOutcome::Invalid(e);
            }
        };

        let name = descriptor.name.clone();
        match self.registry.register(descriptor.clone()) {
            Ok(()) => {
                self.events
                    .emit(RouterEvent::ClientAccepted { client: descriptor });
                RegistrationOutcome::Accepted { name }
            }
            Err(e) => {
                let reason = match &e {
                    RouterError::DuplicateName(_) => "duplicate name".to_string(),
                    other => other.to_string(),
                };
                self.events.emit(RouterEvent::ClientRejected {
                    name: name.clone(),
                    reason,
                });
                RegistrationOutcome::Rejected { name }
            }
        }
    }
}
