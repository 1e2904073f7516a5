//! Router state owner
//!
//! [`Router`] owns the route table, the client registry and the event bus.
//! A transport is attached by building a [`Dispatcher`] (inbound side) and a
//! [`ControlSurface`] (operator side) around it.
//!
//! # Example
//!
//! ```no_run
//! use spacebrew_router::{Router, RouterConfig};
//!
//! let router = Router::new(RouterConfig::default());
//! let report = router.load_routes()?;
//! println!("{} routes", report.loaded);
//! # Ok::<(), spacebrew_router::RouterError>(())
//! ```

use spacebrew_core::{DEFAULT_ROUTE_FILE, REGISTRATION_TOPIC};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::{
    control::{ControlSurface, TestClientCommand},
    dispatcher::Dispatcher,
    error::Result,
    events::{EventBus, RouterEvent, DEFAULT_EVENT_CAPACITY},
    registry::ClientRegistry,
    routes::{LoadReport, RouteStore, RouteTable},
    transport::Transport,
};

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Route file path
    pub route_file: PathBuf,
    /// Topic clients announce themselves on
    pub registration_topic: String,
    /// Buffered events per observer before it starts losing them
    pub event_capacity: usize,
    /// Command for the `testclient` operation
    pub test_client: Option<TestClientCommand>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            route_file: PathBuf::from(DEFAULT_ROUTE_FILE),
            registration_topic: REGISTRATION_TOPIC.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            test_client: None,
        }
    }
}

/// Spacebrew router
pub struct Router {
    config: RouterConfig,
    routes: Arc<RouteTable>,
    registry: Arc<ClientRegistry>,
    events: EventBus,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        if config.event_capacity == 0 {
            warn!("Event capacity of 0 is not allowed, using 1");
        }
        let events = EventBus::new(config.event_capacity.max(1));
        let routes = Arc::new(RouteTable::new(RouteStore::new(&config.route_file)));

        Self {
            config,
            routes,
            registry: Arc::new(ClientRegistry::new()),
            events,
        }
    }

    /// Load the route file, creating it with the defaults if absent
    pub fn load_routes(&self) -> Result<LoadReport> {
        self.routes.load()
    }

    /// Inbound side for `transport`
    pub fn dispatcher(&self, transport: Arc<dyn Transport>) -> Dispatcher {
        Dispatcher::new(
            self.routes.clone(),
            self.registry.clone(),
            transport,
            self.events.clone(),
            self.config.registration_topic.clone(),
        )
    }

    /// Operator side for `transport`
    pub fn control(&self, transport: Arc<dyn Transport>) -> ControlSurface {
        ControlSurface::new(
            self.routes.clone(),
            self.registry.clone(),
            transport,
            self.config.registration_topic.clone(),
            self.config.test_client.clone(),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}
