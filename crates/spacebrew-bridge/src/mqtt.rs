//! MQTT transport for the Spacebrew router
//!
//! [`MqttTransport`] is the publishing half and implements the router's
//! [`Transport`]. [`MqttEventLoop`] is the receiving half: it waits for the
//! first ConnAck, then drives the connection in a task and hands every
//! publish packet to a [`Dispatcher`].
//!
//! The router subscribes to `#` on every ConnAck, so subscriptions come back
//! after an automatic reconnect.

use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use serde::{Deserialize, Serialize};
use spacebrew_core::{DEFAULT_BROKER_PORT, WILDCARD_TOPIC};
use spacebrew_router::{Dispatcher, RouterError, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{BridgeError, Result};

/// Pause before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Outgoing request queue of the MQTT client
const REQUEST_CAPACITY: usize = 100;

/// Upper bound on flushing the DISCONNECT packet at shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttTransportConfig {
    /// Broker host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client ID for the MQTT connection
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Optional username for authentication
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password for authentication
    #[serde(default)]
    pub password: Option<String>,
    /// Keep alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// How long to wait for the first ConnAck
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_BROKER_PORT
}

/// `Spacebrew2_Router_` plus a random suffix
pub fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("Spacebrew2_Router_{}", &id[..8])
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MqttTransportConfig {
    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(1)));
        options.set_clean_session(true);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            options.set_credentials(user, pass);
        }
        options
    }
}

/// Publishing half of the broker connection
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    endpoint: String,
}

impl MqttTransport {
    /// Create the client. Nothing touches the network until
    /// [`MqttEventLoop::start`] is called.
    pub fn new(config: &MqttTransportConfig) -> (Self, MqttEventLoop) {
        let (client, eventloop) = AsyncClient::new(config.options(), REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let transport = Self {
            client: client.clone(),
            connected: connected.clone(),
            endpoint: config.endpoint(),
        };
        let eventloop = MqttEventLoop {
            eventloop,
            client,
            connected,
            endpoint: config.endpoint(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        };

        (transport, eventloop)
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: Bytes) -> spacebrew_router::Result<()> {
        // try_publish only queues, so calling it from the event loop task
        // cannot wait on that same task
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| RouterError::Transport(format!("publish to '{}' failed: {}", topic, e)))?;
        debug!("MQTT sent to topic: {}", topic);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Receiving half of the broker connection
pub struct MqttEventLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    endpoint: String,
    connect_timeout: Duration,
}

impl MqttEventLoop {
    /// Connect, subscribe to everything and start delivering to `dispatcher`.
    ///
    /// Fails if the broker does not accept the connection within the
    /// configured timeout.
    pub async fn start(mut self, dispatcher: Dispatcher) -> Result<MqttHandle> {
        info!("MQTT connecting to {}", self.endpoint);

        let connect_timeout = self.connect_timeout;
        match tokio::time::timeout(connect_timeout, self.wait_for_connack()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(BridgeError::ConnectionFailed(format!(
                    "no answer from {} within {:?}",
                    self.endpoint, connect_timeout
                )))
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connected = self.connected.clone();
        let task = tokio::spawn(self.run(dispatcher, shutdown_rx));

        Ok(MqttHandle {
            connected,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    async fn wait_for_connack(&mut self) -> Result<()> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(BridgeError::ConnectionFailed(format!(
                            "broker {} refused connection: {:?}",
                            self.endpoint, ack.code
                        )));
                    }
                    self.on_connected();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(BridgeError::ConnectionFailed(format!(
                        "{}: {}",
                        self.endpoint, e
                    )))
                }
            }
        }
    }

    fn on_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to MQTT Broker at {}", self.endpoint);

        if let Err(e) = self.client.try_subscribe(WILDCARD_TOPIC, QoS::AtLeastOnce) {
            error!("MQTT subscribe to '{}' failed: {}", WILDCARD_TOPIC, e);
        } else {
            debug!("MQTT subscribed to: {}", WILDCARD_TOPIC);
        }
    }

    async fn run(mut self, dispatcher: Dispatcher, mut shutdown_rx: oneshot::Receiver<()>) {
        loop {
            let event = tokio::select! {
                _ = &mut shutdown_rx => None,
                event = self.eventloop.poll() => Some(event),
            };
            let Some(event) = event else {
                self.disconnect().await;
                break;
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatcher.dispatch(&publish.topic, publish.payload);
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        self.on_connected();
                    } else {
                        warn!("MQTT broker refused reconnect: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!("MQTT disconnected from broker");
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::SeqCst) {
                        error!("MQTT connection to {} lost: {}", self.endpoint, e);
                    } else {
                        debug!("MQTT reconnect to {} failed: {}", self.endpoint, e);
                    }
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("MQTT event loop stopped");
    }

    /// Queue a DISCONNECT and keep polling until it is on the wire
    async fn disconnect(&mut self) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect not queued: {}", e);
            return;
        }

        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("MQTT connection closed during disconnect: {}", e);
                        return false;
                    }
                }
            }
        })
        .await;

        match flushed {
            Ok(true) => info!("Disconnected from MQTT Broker at {}", self.endpoint),
            Ok(false) => {}
            Err(_) => warn!("MQTT disconnect to {} timed out", self.endpoint),
        }
    }
}

/// Running connection; stop it with [`shutdown`](Self::shutdown)
pub struct MqttHandle {
    connected: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MqttHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stop delivering, let an in-flight dispatch finish, then disconnect.
    ///
    /// The event loop sends DISCONNECT itself before its task ends.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("MQTT event loop task ended abnormally: {}", e);
        }

        info!("MQTT transport stopped");
        Ok(())
    }
}
