//! rover-link operator console.
//!
//! Opens the command channel to the configured backend, logs every channel
//! event, and drives the vehicle from lines typed on stdin.

use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use rover_link::channel::CommandChannel;
use rover_link::config::LinkConfig;
use rover_link::domain::{ChannelEvent, Command, EventKind, Speed};
use rover_link::error::LinkError;
use rover_link::rest::RestClient;

const HELP: &str = "commands: forward|backward|left|right|stop [speed], status, clients, reconnect, help, quit";

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Drive(Command, Option<Speed>),
    Status,
    Clients,
    Reconnect,
    Help,
    Quit,
}

impl FromStr for Input {
    type Err = LinkError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(LinkError::InvalidCommand(String::new()));
        };
        let input = match head.to_ascii_lowercase().as_str() {
            "status" => Self::Status,
            "clients" => Self::Clients,
            "reconnect" => Self::Reconnect,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => {
                let command = head.parse::<Command>()?;
                let speed = words.next().map(str::parse::<Speed>).transpose()?;
                return Ok(Self::Drive(command, speed));
            }
        };
        Ok(input)
    }
}

fn log_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connected(true) => tracing::info!("channel open"),
        ChannelEvent::Connected(false) => tracing::warn!("channel closed"),
        ChannelEvent::Status(status) => tracing::info!(
            connected = status.connected,
            status = %status.status,
            last_command = ?status.last_command,
            "vehicle status"
        ),
        ChannelEvent::Acknowledgment(ack) => {
            tracing::info!(command = %ack.command, status = %ack.status, "command acknowledged");
        }
        ChannelEvent::DeviceConnected(device) => {
            tracing::info!(device = %device.device, status = %device.status, "vehicle attached");
        }
        ChannelEvent::DeviceDisconnected => tracing::warn!("vehicle detached"),
        ChannelEvent::Error(err) if err.is_terminal() => {
            tracing::error!(error = %err, "channel gave up, type `reconnect` to retry");
        }
        ChannelEvent::Error(err) => tracing::warn!(error = %err, "channel error"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn drive(channel: &CommandChannel, rest: &RestClient, command: Command, speed: Speed) {
    if channel.send_command(command, speed) {
        return;
    }
    // Channel is down; the backend accepts the same command over HTTP.
    match rest.send_command(command, speed).await {
        Ok(resp) if resp.success => {
            tracing::info!(%command, %speed, message = ?resp.message, "command sent over http");
        }
        Ok(resp) => tracing::warn!(%command, message = ?resp.message, "command rejected"),
        Err(e) => tracing::error!(%command, error = %e, "command failed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = LinkConfig::from_env()?;
    tracing::info!(server = %config.server_url, "starting rover-link");

    let rest = RestClient::new(&config.server_url, config.http_timeout)?;
    let channel = CommandChannel::new(config.channel.clone());
    for kind in EventKind::ALL {
        channel.on(kind, log_event);
    }

    if config.auto_connect {
        channel.connect(&config.server_url);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Input>() {
                    Ok(Input::Drive(command, speed)) => {
                        let speed = speed.unwrap_or(config.channel.default_speed);
                        drive(&channel, &rest, command, speed).await;
                    }
                    Ok(Input::Status) => match rest.status().await {
                        Ok(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                        Err(e) => tracing::error!(error = %e, "status request failed"),
                    },
                    Ok(Input::Clients) => match rest.clients().await {
                        Ok(list) => println!("{} client(s): {:?}", list.total(), list.clients),
                        Err(e) => tracing::error!(error = %e, "clients request failed"),
                    },
                    Ok(Input::Reconnect) => {
                        channel.reset_reconnect_attempts();
                        channel.connect(&config.server_url);
                    }
                    Ok(Input::Help) => println!("{HELP}"),
                    Ok(Input::Quit) => break,
                    Err(e) => println!("{e}\n{HELP}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutting down");
    channel.disconnect();
    Ok(())
}
