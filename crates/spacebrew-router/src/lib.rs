//! Spacebrew Router
//!
//! The router is the hub between clients on a publish-subscribe broker:
//! - Accepts client registrations on the registration topic
//! - Keeps a persistent table of publisher -> subscriber topic routes
//! - Republishes every message seen on a routed topic to its subscriber
//! - Reports what it does to observers through an event bus
//!
//! The broker itself sits behind the [`Transport`] trait; the MQTT
//! implementation lives in `spacebrew-bridge`.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use spacebrew_router::{Router, RouterConfig, Transport};
//! use std::sync::Arc;
//!
//! fn run(transport: Arc<dyn Transport>) -> spacebrew_router::Result<()> {
//!     let router = Router::new(RouterConfig::default());
//!     router.load_routes()?;
//!
//!     let dispatcher = router.dispatcher(transport.clone());
//!     dispatcher.dispatch("VirtualButton1/button", Bytes::from_static(b"true"));
//!
//!     let control = router.control(transport);
//!     println!("{}", control.add_route("sensors/temp", "display/text")?);
//!     Ok(())
//! }
//! ```

pub mod control;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod registry;
pub mod router;
pub mod routes;
pub mod transport;

pub use control::{ConnectionStatus, ControlSurface, TestClientCommand};
pub use dispatcher::{DispatchReport, Dispatcher, RegistrationOutcome};
pub use error::{Result, RouterError};
pub use events::{EventBus, RouterEvent, DEFAULT_EVENT_CAPACITY};
pub use registry::ClientRegistry;
pub use router::{Router, RouterConfig};
pub use routes::{AddOutcome, LoadReport, RouteMap, RouteStore, RouteTable};
pub use transport::Transport;
