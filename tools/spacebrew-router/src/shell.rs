//! Interactive operator shell
//!
//! [`Shell::execute`] turns one input line into a [`ShellReply`]; reading
//! stdin and printing happen in [`run`].

use colored::Colorize;
use spacebrew_router::ControlSurface;
use std::io::{BufRead, Write};
use tokio::sync::watch;
use tracing::debug;

pub const PROMPT: &str = ">> ";

const HELP: &str = "\
Available commands:
  routes                       Show the current routing table
  saveroutes                   Save the routing table to the route file
  addroute <publisher> <subscriber>
                               Add a route (topics must not contain spaces)
  delroute <publisher>         Delete the route for a publisher topic
  server                       Show the broker address
  clients                      Show registered clients
  connection                   Check the broker connection
  testclient                   Start a test client in the background
  publish <topic> <message>    Publish a message
  quit                         Stop the router";

/// Output of one shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellReply {
    pub output: String,
    /// The operator asked to stop the router
    pub quit: bool,
}

impl ShellReply {
    fn print(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            quit: false,
        }
    }
}

pub struct Shell {
    control: ControlSurface,
}

impl Shell {
    pub fn new(control: ControlSurface) -> Self {
        Self { control }
    }

    pub fn execute(&self, line: &str) -> ShellReply {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => ShellReply::print(""),
            "help" | "?" => ShellReply::print(HELP),
            "routes" => self.routes(),
            "saveroutes" => self.save_routes(),
            "addroute" => self.add_route(rest),
            "delroute" => self.delete_route(rest),
            "server" => self.server(),
            "clients" => self.clients(),
            "connection" => self.connection(),
            "testclient" => self.test_client(),
            "publish" => self.publish(rest),
            "quit" | "exit" => ShellReply {
                output: "Stopping MQTT loop and exiting.".to_string(),
                quit: true,
            },
            other => ShellReply::print(format!(
                "{} Unknown command '{}'. Type \"help\" for available commands.",
                "*".yellow(),
                other
            )),
        }
    }

    fn routes(&self) -> ShellReply {
        let routes = self.control.list_routes();
        if routes.is_empty() {
            return ShellReply::print("The routing table is empty.");
        }

        let mut out = String::from("--- Current Routes ---\n");
        for (publisher, subscriber) in &routes {
            out.push_str(&format!("  {} -> {}\n", publisher.cyan(), subscriber));
        }
        out.push_str("----------------------\n");
        out.push_str(&format!("Total routes: {}", routes.len()));
        ShellReply::print(out)
    }

    fn save_routes(&self) -> ShellReply {
        match self.control.save_routes() {
            Ok(msg) => ShellReply::print(format!("{} {}", "✓".green(), msg)),
            Err(e) => ShellReply::print(format!("{} Failed to save routes: {}", "✗".red(), e)),
        }
    }

    fn add_route(&self, args: &str) -> ShellReply {
        let parts: Vec<&str> = args.split_whitespace().collect();
        let [publisher, subscriber] = parts.as_slice() else {
            return ShellReply::print(
                "Error: Requires exactly two arguments: publisher and subscriber topic.\n\
                 Usage: addroute <publisher_topic> <subscriber_topic>",
            );
        };

        match self.control.add_route(publisher, subscriber) {
            Ok(msg) => ShellReply::print(format!("{} {}", "✓".green(), msg)),
            Err(e) => ShellReply::print(format!("{} {}", "✗".red(), e)),
        }
    }

    fn delete_route(&self, args: &str) -> ShellReply {
        let parts: Vec<&str> = args.split_whitespace().collect();
        let [publisher] = parts.as_slice() else {
            return ShellReply::print("Usage: delroute <publisher_topic>");
        };

        match self.control.delete_route(publisher) {
            Ok(msg) => ShellReply::print(format!("{} {}", "✓".green(), msg)),
            Err(e) => ShellReply::print(format!("{} {}", "✗".red(), e)),
        }
    }

    fn server(&self) -> ShellReply {
        ShellReply::print(format!(
            "Broker: {}",
            self.control.connection_status().broker
        ))
    }

    fn clients(&self) -> ShellReply {
        let clients = self.control.list_clients();
        if clients.is_empty() {
            return ShellReply::print("No clients are currently registered.");
        }

        let mut out = String::from("--- Registered Clients ---\n");
        for (i, client) in clients.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, client.name.cyan()));
        }
        out.push_str("--------------------------\n");
        out.push_str(&format!("Total: {} clients.", clients.len()));
        ShellReply::print(out)
    }

    fn connection(&self) -> ShellReply {
        let status = self.control.connection_status();
        if status.connected {
            ShellReply::print(format!(
                "{} to MQTT Broker at {}",
                "Connected".green().bold(),
                status.broker
            ))
        } else {
            ShellReply::print(format!(
                "{} from MQTT Broker at {}",
                "Disconnected".red().bold(),
                status.broker
            ))
        }
    }

    fn test_client(&self) -> ShellReply {
        match self.control.spawn_test_client() {
            Ok(msg) => ShellReply::print(format!("{} {}", "✓".green(), msg)),
            Err(e) => ShellReply::print(format!("{} Error starting test client: {}", "✗".red(), e)),
        }
    }

    fn publish(&self, args: &str) -> ShellReply {
        let Some((topic, message)) = args.split_once(char::is_whitespace) else {
            return ShellReply::print("Error: Usage is 'publish <topic> <message>'");
        };

        match self.control.publish(topic, message.trim()) {
            Ok(msg) => ShellReply::print(format!("{} {}", "✓".green(), msg)),
            Err(e) => ShellReply::print(format!(
                "{} Failed to publish message to topic {}: {}",
                "✗".red(),
                topic,
                e
            )),
        }
    }
}

/// Read commands from stdin until `quit` or end of input.
///
/// Blocks the calling thread. `quit` flips `shutdown` to true; end of input
/// only ends the shell.
pub fn run(shell: Shell, shutdown: watch::Sender<bool>) {
    println!(
        "Welcome to {}. Type \"help\" for available commands.",
        "Spacebrew 2.0".cyan().bold()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", PROMPT);
        let _ = std::io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                debug!("Shell input error: {}", e);
                break;
            }
            None => break,
        };

        let reply = shell.execute(&line);
        if !reply.output.is_empty() {
            println!("{}", reply.output);
        }
        if reply.quit {
            let _ = shutdown.send(true);
            return;
        }
    }

    debug!("Shell input closed");
}
