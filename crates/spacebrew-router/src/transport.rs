//! Transport boundary
//!
//! The router only needs to publish and to know whether it is connected.
//! Delivery of inbound messages is driven by the transport itself, which
//! calls [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) per message.

use bytes::Bytes;

use crate::Result;

pub trait Transport: Send + Sync {
    /// Publish `payload` to `topic` with at-least-once intent.
    ///
    /// Must not block: it is called from inside the delivery loop.
    fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Whether the broker connection is currently up
    fn is_connected(&self) -> bool;

    /// Human-readable broker address, e.g. `localhost:1883`
    fn endpoint(&self) -> String;
}
