// Configuration loading
pub mod config;

// Producer-to-scene coordinate transform
pub mod mapping;

// Wire messages exchanged with the simulation producer
pub mod protocol;

// Bounded render-handle pool
pub mod pool;

// Snapshot diffing and interpolation
pub mod reconcile;

// Transport and reconnection state machine
pub mod connection;

// Per-tick composition for hosts
pub mod bridge;

pub use bridge::{Bridge, BridgeEvent};
pub use config::{load_config, JunctionConfig};
