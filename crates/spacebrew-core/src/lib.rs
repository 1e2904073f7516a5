//! Spacebrew Core
//!
//! Shared types for the Spacebrew topic router.
//!
//! This crate provides:
//! - Client descriptors ([`ClientDescriptor`], [`Channel`], [`ValueType`])
//! - Registration announcement parsing ([`parse_registration`])
//! - Well-known topic and file constants

pub mod error;
pub mod registration;
pub mod types;

pub use error::{ParseError, Result};
pub use registration::{parse_registration, Registration};
pub use types::{Channel, ClientDescriptor, ValueType};

/// Topic clients announce themselves on
pub const REGISTRATION_TOPIC: &str = "YuxiSpace";

/// Wildcard the router subscribes to
pub const WILDCARD_TOPIC: &str = "#";

/// Default MQTT broker port
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default route file name
pub const DEFAULT_ROUTE_FILE: &str = "routes.txt";

/// First line of every route file written by the router
pub const ROUTE_FILE_HEADER: &str = "# Spacebrew2 Router Routes: Publisher, Subscriber";
