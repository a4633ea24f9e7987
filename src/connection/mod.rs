mod config;
mod transport;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use config::ConnectionConfig;
pub use transport::{Transport, TransportEvent, WebSocketTransport};

use crate::protocol::{
    parse_server_message, ClientCommand, RestartInfo, RunSummary, ServerMessage, Snapshot,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Link state as seen by the consumer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Notifications emitted by the connection manager, in arrival order
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    /// An open connection was lost (emitted once per loss)
    Disconnected,
    Snapshot(Snapshot),
    RunRestarted(RestartInfo),
    RunCompleted(RunSummary),
    /// Retry budget exhausted; no further attempts until `reset`
    GaveUp { attempts: u32 },
}

/// Message counters, cleared on every `sim_restart`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub messages_received: u64,
    pub snapshots: u64,
    /// Frames that were not valid JSON objects with a `type`
    pub parse_faults: u64,
    /// Well-formed frames with an unknown type or a bad payload
    pub protocol_faults: u64,
    pub commands_sent: u64,
    pub commands_dropped: u64,
}

/// Keeps a single producer link alive and turns its frames into events.
///
/// Driven entirely by `poll`; nothing here blocks. Inbound frames are
/// decoded in arrival order and malformed ones are counted and skipped
/// without touching the link.
pub struct ConnectionManager<T: Transport> {
    config: ConnectionConfig,
    transport: T,
    state: ConnectionState,
    /// Consecutive failed attempts since the last successful open
    attempts: u32,
    retry_in: f64,
    connecting_for: f64,
    gave_up: bool,
    stats: ConnectionStats,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager and the receiver its events are delivered on.
    /// The first attempt starts on the first `poll`.
    pub fn new(
        config: ConnectionConfig,
        transport: T,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let manager = Self {
            config,
            transport,
            state: ConnectionState::Disconnected,
            attempts: 0,
            retry_in: 0.0,
            connecting_for: 0.0,
            gave_up: false,
            stats: ConnectionStats::default(),
            events: tx,
        };

        (manager, rx)
    }

    /// Advance timers by `elapsed_seconds` and drain everything the
    /// transport has buffered
    pub fn poll(&mut self, elapsed_seconds: f64) {
        let dt = if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
            elapsed_seconds
        } else {
            0.0
        };

        match self.state {
            ConnectionState::Disconnected => {
                if self.gave_up {
                    return;
                }
                self.retry_in -= dt;
                if self.retry_in > 0.0 || !self.begin_attempt() {
                    return;
                }
            }
            ConnectionState::Connecting => self.connecting_for += dt,
            ConnectionState::Connected => {}
        }

        self.drain_transport();

        if self.state == ConnectionState::Connecting
            && self.config.connect_timeout_seconds > 0.0
            && self.connecting_for >= self.config.connect_timeout_seconds
        {
            self.fail(format!(
                "no response after {:.1}s",
                self.config.connect_timeout_seconds
            ));
        }
    }

    /// Serialize and send a command. Dropped with a warning unless connected.
    pub fn send_command(&mut self, command: &ClientCommand) {
        if self.state != ConnectionState::Connected {
            self.stats.commands_dropped += 1;
            warn!(command = command.name(), "Not connected, command dropped");
            return;
        }

        let result = serde_json::to_string(command)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.transport.send(json));

        match result {
            Ok(()) => {
                self.stats.commands_sent += 1;
                debug!(command = command.name(), "Command sent");
            }
            Err(e) => {
                self.stats.commands_dropped += 1;
                warn!(command = command.name(), error = %e, "Failed to send command");
            }
        }
    }

    /// Close the link, clear the give-up latch and counters, and retry on
    /// the next `poll`
    pub fn reset(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;

        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.attempts = 0;
        self.retry_in = 0.0;
        self.connecting_for = 0.0;
        self.gave_up = false;
        self.stats = ConnectionStats::default();

        if was_connected {
            self.emit(ConnectionEvent::Disconnected);
        }
        info!("Connection reset");
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn has_given_up(&self) -> bool {
        self.gave_up
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start an attempt unless the retry budget is spent
    fn begin_attempt(&mut self) -> bool {
        if let Some(limit) = self.config.attempt_limit() {
            if self.attempts >= limit {
                self.give_up();
                return false;
            }
        }

        self.attempts = self.attempts.saturating_add(1);
        self.state = ConnectionState::Connecting;
        self.connecting_for = 0.0;

        info!(url = %self.config.url, attempt = self.attempts, "Connecting to producer");
        self.transport.connect(&self.config.url);
        true
    }

    fn drain_transport(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Opened => self.on_opened(),
                TransportEvent::Text(text) => self.on_text(&text),
                TransportEvent::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => self.on_text(&text),
                    Err(e) => {
                        if self.state == ConnectionState::Connected {
                            self.stats.messages_received += 1;
                            self.stats.parse_faults += 1;
                            warn!(error = %e, "Dropping binary frame that is not UTF-8");
                        }
                    }
                },
                TransportEvent::Closed(reason) => {
                    self.fail(reason.unwrap_or_else(|| "closed by peer".to_string()));
                    break;
                }
                TransportEvent::Failed(reason) => {
                    self.fail(reason);
                    break;
                }
            }
        }
    }

    fn on_opened(&mut self) {
        if self.state != ConnectionState::Connecting {
            debug!("Ignoring open notification outside an attempt");
            return;
        }

        self.state = ConnectionState::Connected;
        self.attempts = 0;
        info!(url = %self.config.url, "Connected to producer");
        self.emit(ConnectionEvent::Connected);
    }

    fn on_text(&mut self, text: &str) {
        if self.state != ConnectionState::Connected {
            debug!("Dropping frame received outside an open connection");
            return;
        }

        self.stats.messages_received += 1;

        let message = match parse_server_message(text) {
            Ok(message) => message,
            Err(e) if e.is_parse_fault() => {
                self.stats.parse_faults += 1;
                warn!(error = %e, "Dropping unparseable message");
                return;
            }
            Err(e) => {
                self.stats.protocol_faults += 1;
                warn!(error = %e, "Dropping unsupported message");
                return;
            }
        };

        debug!(kind = message.kind(), "Message received");

        match message {
            ServerMessage::StateUpdate(snapshot) | ServerMessage::VehicleUpdate(snapshot) => {
                self.stats.snapshots += 1;
                self.emit(ConnectionEvent::Snapshot(snapshot));
            }
            ServerMessage::SimRestart(restart) => {
                info!(run = restart.run, seed = restart.seed, "Simulation restarted");
                self.stats = ConnectionStats::default();
                self.emit(ConnectionEvent::RunRestarted(restart));
            }
            ServerMessage::SimComplete(summary) => {
                info!(
                    total_arrived = summary.total_arrived,
                    avg_wait = summary.avg_wait,
                    total_reward = summary.total_reward,
                    "Simulation run complete"
                );
                self.emit(ConnectionEvent::RunCompleted(summary));
            }
        }
    }

    /// Tear down the current link or attempt and schedule the next one
    fn fail(&mut self, reason: String) {
        let was_connected = self.state == ConnectionState::Connected;

        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.connecting_for = 0.0;
        self.retry_in = self.config.retry_delay_seconds.max(0.0);

        if was_connected {
            warn!(reason = %reason, "Connection lost");
            self.emit(ConnectionEvent::Disconnected);
        } else {
            warn!(
                attempt = self.attempts,
                retry_in = self.retry_in,
                reason = %reason,
                "Connection attempt failed"
            );
        }

        if let Some(limit) = self.config.attempt_limit() {
            if self.attempts >= limit {
                self.give_up();
            }
        }
    }

    fn give_up(&mut self) {
        if self.gave_up {
            return;
        }
        self.gave_up = true;
        error!(
            url = %self.config.url,
            attempts = self.attempts,
            "Giving up on producer connection"
        );
        self.emit(ConnectionEvent::GaveUp {
            attempts: self.attempts,
        });
    }

    fn emit(&self, event: ConnectionEvent) {
        // Receiver may be gone during shutdown
        let _ = self.events.send(event);
    }
}
