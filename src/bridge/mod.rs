// Host-facing composite: one connection, one reconciliation engine

use crate::config::JunctionConfig;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats, Transport,
};
use crate::mapping::MappingError;
use crate::protocol::{ClientCommand, RestartInfo, RunSummary};
use crate::reconcile::{FrameState, ReconciliationEngine};
use tokio::sync::mpsc;
use tracing::info;


/// What the host sees from one tick
#[derive(Clone, Debug)]
pub enum BridgeEvent {
    Connected,
    Disconnected,
    GaveUp { attempts: u32 },
    /// Tracked entities were cleared for a new run
    RunRestarted(RestartInfo),
    RunCompleted(RunSummary),
    /// Reconciled state right after a snapshot was applied
    Frame(FrameState),
}

/// Wires connection events into the reconciliation engine once per tick
pub struct Bridge<T: Transport> {
    connection: ConnectionManager<T>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    engine: ReconciliationEngine,
}

impl<T: Transport> Bridge<T> {
    pub fn new(
        connection: ConnectionManager<T>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        engine: ReconciliationEngine,
    ) -> Self {
        Self {
            connection,
            events,
            engine,
        }
    }

    /// Build every component from configuration
    pub fn from_config(config: &JunctionConfig, transport: T) -> Result<Self, MappingError> {
        let engine =
            ReconciliationEngine::from_config(&config.mapping, &config.pool, &config.reconcile)?;
        let (connection, events) = ConnectionManager::new(config.connection.clone(), transport);
        Ok(Self::new(connection, events, engine))
    }

    /// One host frame: poll the link, apply everything it delivered in
    /// order, then advance interpolation by `delta_seconds`
    pub fn tick(&mut self, delta_seconds: f64) -> Vec<BridgeEvent> {
        self.connection.poll(delta_seconds);

        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                ConnectionEvent::Snapshot(snapshot) => {
                    self.engine.apply_snapshot(&snapshot);
                    out.push(BridgeEvent::Frame(self.engine.readout()));
                }
                ConnectionEvent::RunRestarted(restart) => {
                    self.engine.clear();
                    info!(run = restart.run, seed = restart.seed, "Scene cleared for new run");
                    out.push(BridgeEvent::RunRestarted(restart));
                }
                ConnectionEvent::RunCompleted(summary) => {
                    out.push(BridgeEvent::RunCompleted(summary))
                }
                ConnectionEvent::Connected => out.push(BridgeEvent::Connected),
                ConnectionEvent::Disconnected => out.push(BridgeEvent::Disconnected),
                ConnectionEvent::GaveUp { attempts } => {
                    out.push(BridgeEvent::GaveUp { attempts })
                }
            }
        }

        self.engine.advance(delta_seconds);
        out
    }

    /// Current interpolated state, for renderers that redraw every frame
    pub fn frame(&self) -> FrameState {
        self.engine.readout()
    }

    pub fn send_command(&mut self, command: &ClientCommand) {
        self.connection.send_command(command);
    }

    /// Reconnect from scratch after a give-up
    pub fn reconnect(&mut self) {
        self.connection.reset();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_stats(&self) -> &ConnectionStats {
        self.connection.stats()
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }
}
