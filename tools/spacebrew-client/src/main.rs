//! Spacebrew example client
//!
//! Registers with the router, subscribes to its own subscriber topics,
//! prints whatever arrives there and publishes alternating `true`/`false`
//! on `<name>/button`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use spacebrew_core::{Channel, ClientDescriptor, DEFAULT_BROKER_PORT, REGISTRATION_TOPIC};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spacebrew-client")]
#[command(about = "Spacebrew example client")]
#[command(version)]
struct Cli {
    /// MQTT broker host
    #[arg(short, long, default_value = "localhost")]
    server: String,

    /// MQTT broker port
    #[arg(short, long, default_value_t = DEFAULT_BROKER_PORT)]
    port: u16,

    /// Client name (random if omitted)
    #[arg(short, long)]
    name: Option<String>,

    /// Client description
    #[arg(short, long, default_value = "An example client with multiple publishers and subscribers")]
    description: String,

    /// Publisher channel as name:type (repeatable)
    #[arg(long = "pub", default_values = ["button:boolean", "slider:range", "text_out:string"])]
    publishers: Vec<String>,

    /// Subscriber channel as name:type (repeatable)
    #[arg(long = "sub", default_values = ["led:boolean", "display:string", "servo:range"])]
    subscribers: Vec<String>,

    /// Registration topic
    #[arg(long, default_value = REGISTRATION_TOPIC)]
    registration_topic: String,

    /// Number of button presses to send
    #[arg(short, long, default_value_t = 5)]
    count: u32,

    /// Delay between presses in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn descriptor(&self) -> ClientDescriptor {
        let name = self.name.clone().unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("ExampleClient_{}", &id[..6])
        });

        let mut client = ClientDescriptor::new(name, &self.description);
        for spec in &self.publishers {
            client = client.with_publisher(Channel::parse(spec));
        }
        for spec in &self.subscribers {
            client = client.with_subscriber(Channel::parse(spec));
        }
        client
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = cli.descriptor();
    let mut options = MqttOptions::new(&client.name, &cli.server, cli.port);
    options.set_keep_alive(Duration::from_secs(60));

    println!("Connecting to {}:{}...", cli.server, cli.port);
    let (mqtt, mut eventloop) = AsyncClient::new(options, 100);

    let (connected_tx, mut connected_rx) = mpsc::channel::<std::result::Result<(), String>>(1);
    let poller = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    let result = if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(format!("return code {:?}", ack.code))
                    };
                    // only the first answer is awaited
                    let _ = connected_tx.try_send(result);
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    println!(
                        "{} Received message on {}: {}",
                        "<-".blue(),
                        p.topic.cyan(),
                        String::from_utf8_lossy(&p.payload)
                    );
                }
                Ok(event) => debug!("MQTT event: {:?}", event),
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    let _ = connected_tx.try_send(Err(e.to_string()));
                    break;
                }
            }
        }
    });

    match tokio::time::timeout(Duration::from_secs(10), connected_rx.recv()).await {
        Ok(Some(Ok(()))) => println!(
            "{} Connected to MQTT Broker at {}:{}",
            "OK".green().bold(),
            cli.server,
            cli.port
        ),
        Ok(Some(Err(e))) => bail!("Failed to connect: {}", e),
        Ok(None) | Err(_) => bail!("No answer from broker at {}:{}", cli.server, cli.port),
    }

    let announcement = client.announcement();
    println!("{} Sending registration: {}", "->".yellow(), announcement);
    mqtt.publish(&cli.registration_topic, QoS::AtLeastOnce, false, announcement)
        .await
        .context("Failed to send registration")?;

    for sub in &client.subscribers {
        let topic = format!("{}/{}", client.name, sub.name);
        mqtt.subscribe(&topic, QoS::AtLeastOnce)
            .await
            .with_context(|| format!("Failed to subscribe to {}", topic))?;
        debug!("Subscribed to {}", topic);
    }

    let button = format!("{}/button", client.name);
    for i in 0..cli.count {
        let value = if i % 2 == 0 { "true" } else { "false" };
        println!("{} Sending {} to {}", "->".yellow(), value, button);
        mqtt.publish(&button, QoS::AtLeastOnce, false, value)
            .await
            .with_context(|| format!("Failed to publish to {}", button))?;
        tokio::time::sleep(Duration::from_millis(cli.interval_ms)).await;
    }

    println!("Done sending messages. Exiting.");
    mqtt.disconnect().await.context("Failed to disconnect")?;
    let _ = tokio::time::timeout(Duration::from_secs(2), poller).await;

    Ok(())
}
