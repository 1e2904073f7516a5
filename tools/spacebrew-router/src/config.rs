//! Configuration file support
//!
//! ```toml
//! [broker]
//! host = "localhost"
//! port = 1883
//!
//! [routes]
//! file = "routes.txt"
//!
//! [web]
//! enabled = true
//! bind = "0.0.0.0:8088"
//!
//! [registration]
//! topic = "YuxiSpace"
//!
//! [test_client]
//! command = "spacebrew-client"
//! args = ["--name", "TestClient"]
//! ```
//!
//! Every section and key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spacebrew_bridge::{MqttTransportConfig, WebConfig};
use spacebrew_core::{DEFAULT_ROUTE_FILE, REGISTRATION_TOPIC};
use spacebrew_router::{RouterConfig, TestClientCommand, DEFAULT_EVENT_CAPACITY};
use std::path::{Path, PathBuf};

use crate::Cli;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: MqttTransportConfig,
    pub routes: RoutesSection,
    pub web: WebSection,
    pub registration: RegistrationSection,
    pub test_client: TestClientSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesSection {
    pub file: PathBuf,
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_ROUTE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub server: WebConfig,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            enabled: true,
            server: WebConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSection {
    pub topic: String,
}

impl Default for RegistrationSection {
    fn default() -> Self {
        Self {
            topic: REGISTRATION_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestClientSection {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for TestClientSection {
    fn default() -> Self {
        Self {
            command: "spacebrew-client".to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Command line flags win over file values
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(server) = &cli.server {
            self.broker.host = server.clone();
        }
        if let Some(port) = cli.port {
            self.broker.port = port;
        }
        if let Some(routes) = &cli.routes {
            self.routes.file = routes.clone();
        }
        if let Some(bind) = &cli.web_bind {
            self.web.server.bind = bind.clone();
        }
        if cli.no_web {
            self.web.enabled = false;
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        let test_client = if self.test_client.command.is_empty() {
            None
        } else {
            Some(
                TestClientCommand::new(&self.test_client.command)
                    .with_args(self.test_client.args.iter().cloned()),
            )
        };

        RouterConfig {
            route_file: self.routes.file.clone(),
            registration_topic: self.registration.topic.clone(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            test_client,
        }
    }
}
