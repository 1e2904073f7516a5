//! Operator and API commands
//!
//! The shell and the HTTP API both go through [`ControlSurface`], so a
//! command behaves the same whichever surface issued it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use spacebrew_core::ClientDescriptor;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{Result, RouterError},
    registry::ClientRegistry,
    routes::{AddOutcome, RouteMap, RouteTable},
    transport::Transport,
};

/// Command launched by `testclient`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClientCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl TestClientCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Broker connection snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub broker: String,
}

#[derive(Clone)]
pub struct ControlSurface {
    routes: Arc<RouteTable>,
    registry: Arc<ClientRegistry>,
    transport: Arc<dyn Transport>,
    registration_topic: String,
    test_client: Option<TestClientCommand>,
}

impl ControlSurface {
    pub fn new(
        routes: Arc<RouteTable>,
        registry: Arc<ClientRegistry>,
        transport: Arc<dyn Transport>,
        registration_topic: impl Into<String>,
        test_client: Option<TestClientCommand>,
    ) -> Self {
        Self {
            routes,
            registry,
            transport,
            registration_topic: registration_topic.into(),
            test_client,
        }
    }

    pub fn list_routes(&self) -> RouteMap {
        self.routes.list()
    }

    pub fn add_route(&self, publisher: &str, subscriber: &str) -> Result<String> {
        match self.routes.add_route(publisher, subscriber)? {
            AddOutcome::Added { replaced: None } => {
                Ok(format!("Route added: {} -> {}", publisher, subscriber))
            }
            AddOutcome::Added {
                replaced: Some(previous),
            } => Ok(format!(
                "Route updated: {} -> {} (was {})",
                publisher, subscriber, previous
            )),
            AddOutcome::Unchanged => Err(RouterError::RouteExists {
                publisher: publisher.to_string(),
                subscriber: subscriber.to_string(),
            }),
        }
    }

    pub fn delete_route(&self, publisher: &str) -> Result<String> {
        if publisher.is_empty() {
            return Err(RouterError::InvalidArgument(
                "publisher topic is required".to_string(),
            ));
        }
        let subscriber = self.routes.delete_route(publisher)?;
        Ok(format!("Route deleted: {} -> {}", publisher, subscriber))
    }

    pub fn save_routes(&self) -> Result<String> {
        self.routes.save()?;
        Ok(format!(
            "Routes saved to '{}'",
            self.routes.store().path().display()
        ))
    }

    pub fn list_clients(&self) -> Vec<ClientDescriptor> {
        self.registry.list()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.transport.is_connected(),
            broker: self.transport.endpoint(),
        }
    }

    pub fn publish(&self, topic: &str, message: &str) -> Result<String> {
        if topic.is_empty() || message.is_empty() {
            return Err(RouterError::InvalidArgument(
                "missing topic or message".to_string(),
            ));
        }
        self.transport
            .publish(topic, Bytes::copy_from_slice(message.as_bytes()))?;
        Ok(format!("Published: '{}' to topic '{}'", message, topic))
    }

    /// Announce a client on behalf of a caller without its own broker
    /// connection.
    ///
    /// The announcement goes out on the registration topic and is handled
    /// by the dispatcher like any other, so the result of the registration
    /// itself is only visible as an event.
    pub fn register(&self, announcement: &str) -> Result<String> {
        if announcement.trim().is_empty() {
            return Err(RouterError::InvalidArgument(
                "registration message is empty".to_string(),
            ));
        }
        self.transport.publish(
            &self.registration_topic,
            Bytes::copy_from_slice(announcement.as_bytes()),
        )?;
        Ok(format!(
            "Registration sent to '{}'",
            self.registration_topic
        ))
    }

    /// Launch the configured test client as a detached child process
    pub fn spawn_test_client(&self) -> Result<String> {
        let command = self
            .test_client
            .as_ref()
            .ok_or_else(|| RouterError::Spawn("no test client configured".to_string()))?;

        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(std::process::Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!("Error starting test client '{}': {}", command.program, e);
                RouterError::Spawn(format!("{}: {}", command.program, e))
            })?;

        info!(
            "Spawned test client '{}' (pid {:?})",
            command.program,
            child.id()
        );
        // the child outlives its handle; it is never awaited
        drop(child);

        Ok("Test client started in background.".to_string())
    }

    pub fn test_client(&self) -> Option<&TestClientCommand> {
        self.test_client.as_ref()
    }
}

impl std::fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlSurface")
            .field("routes", &self.routes)
            .field("endpoint", &self.transport.endpoint())
            .field("registration_topic", &self.registration_topic)
            .finish()
    }
}
