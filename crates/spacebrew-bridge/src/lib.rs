//! Spacebrew bridges
//!
//! Connects the router to the outside world:
//! - MQTT broker connection implementing the router's `Transport`
//! - HTTP JSON API and WebSocket live updates for operators and web clients

pub mod error;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

pub use error::{BridgeError, Result};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttEventLoop, MqttHandle, MqttTransport, MqttTransportConfig};

#[cfg(feature = "http")]
pub use http::{WebConfig, WebServer};
