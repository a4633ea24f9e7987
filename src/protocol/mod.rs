use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::mapping::ProducerPoint;


/// Producer vehicle type that marks a priority (emergency) vehicle
pub const PRIORITY_KIND: &str = "emergency";

/// Render/pool class of an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Standard,
    Priority,
}

impl EntityClass {
    pub fn from_kind(kind: &str) -> Self {
        if kind == PRIORITY_KIND {
            EntityClass::Priority
        } else {
            EntityClass::Standard
        }
    }
}

/// One vehicle as it appears on the wire
#[derive(Clone, Debug, Deserialize)]
struct WireVehicle {
    id: String,
    x: f64,
    y: f64,
    #[serde(default)]
    angle: f64,
    #[serde(default)]
    speed: f64,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    edge: String,
}

/// Live entity descriptor inside a snapshot
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityDescriptor {
    pub id: String,
    pub position: ProducerPoint,
    /// Producer heading in degrees (0 = north, clockwise)
    pub heading: f64,
    pub class: EntityClass,
    pub speed: f64,
    pub kind: String,
    pub edge: String,
}

impl From<WireVehicle> for EntityDescriptor {
    fn from(v: WireVehicle) -> Self {
        Self {
            class: EntityClass::from_kind(&v.kind),
            id: v.id,
            position: ProducerPoint::new(v.x, v.y),
            heading: v.angle,
            speed: v.speed,
            kind: v.kind,
            edge: v.edge,
        }
    }
}

/// Per-approach figures (queue lengths, wait times)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApproachFigures {
    #[serde(default)]
    pub north: f64,
    #[serde(default)]
    pub south: f64,
    #[serde(default)]
    pub east: f64,
    #[serde(default)]
    pub west: f64,
}

/// Emergency preemption status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub approach: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
}

/// Signal phase and run metrics carried by `state_update`.
///
/// Passed through untouched to presentation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    #[serde(default)]
    pub step: u64,
    #[serde(default)]
    pub phase: u32,
    #[serde(default)]
    pub phase_name: String,
    #[serde(default)]
    pub phase_timer: u64,
    #[serde(default)]
    pub in_yellow: bool,
    #[serde(default)]
    pub queues: ApproachFigures,
    #[serde(default)]
    pub wait_times: ApproachFigures,
    #[serde(default)]
    pub vehicles_completed: u64,
    #[serde(default)]
    pub avg_wait: f64,
    #[serde(default)]
    pub emergency: EmergencyStatus,
    #[serde(default)]
    pub ai_decision: String,
    #[serde(default)]
    pub reward: f64,
    #[serde(default)]
    pub total_reward: f64,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub preempted: bool,
    #[serde(default)]
    pub done: bool,
}

/// Point-in-time view of the producer's live entities
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub entities: Vec<EntityDescriptor>,
    /// Present for full state updates only
    pub signal: Option<SignalState>,
    pub sim_time: f64,
}

/// Metadata of a `sim_restart`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RestartInfo {
    #[serde(default)]
    pub run: u64,
    #[serde(default)]
    pub seed: u64,
}

/// Metadata of a `sim_complete`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub total_arrived: u64,
    #[serde(default)]
    pub avg_wait: f64,
    #[serde(default)]
    pub total_reward: f64,
}

#[derive(Deserialize)]
struct StateUpdatePayload {
    vehicles: Vec<WireVehicle>,
    #[serde(default)]
    sim_time: f64,
    #[serde(flatten)]
    signal: SignalState,
}

#[derive(Deserialize)]
struct VehicleUpdatePayload {
    vehicles: Vec<WireVehicle>,
    #[serde(default)]
    sim_time: f64,
}

/// Producer → client messages
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    /// Full state: entities plus signal/metrics
    StateUpdate(Snapshot),
    /// Entities only
    VehicleUpdate(Snapshot),
    SimRestart(RestartInfo),
    SimComplete(RunSummary),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::StateUpdate(_) => "state_update",
            ServerMessage::VehicleUpdate(_) => "vehicle_update",
            ServerMessage::SimRestart(_) => "sim_restart",
            ServerMessage::SimComplete(_) => "sim_complete",
        }
    }
}

/// Errors raised while classifying an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Not valid JSON
    Malformed(String),
    /// Valid JSON, but not an object
    NotObject,
    /// Object without a string `type`
    MissingType,
    /// `type` not in the recognized set
    UnknownType(String),
    /// Recognized `type`, payload does not match its shape
    InvalidPayload { kind: String, reason: String },
}

impl ProtocolError {
    /// Parse faults: the payload could not be read at all
    pub fn is_parse_fault(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_) | ProtocolError::NotObject)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(e) => write!(f, "malformed JSON: {}", e),
            ProtocolError::NotObject => write!(f, "message must be a JSON object"),
            ProtocolError::MissingType => write!(f, "message has no string 'type' field"),
            ProtocolError::UnknownType(t) => write!(f, "unknown message type '{}'", t),
            ProtocolError::InvalidPayload { kind, reason } => {
                write!(f, "invalid '{}' payload: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

fn payload<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Convert wire vehicles, keeping the first occurrence of any repeated id
fn descriptors(vehicles: Vec<WireVehicle>) -> Vec<EntityDescriptor> {
    let mut seen = HashSet::with_capacity(vehicles.len());
    let mut out = Vec::with_capacity(vehicles.len());

    for vehicle in vehicles {
        if seen.insert(vehicle.id.clone()) {
            out.push(EntityDescriptor::from(vehicle));
        } else {
            debug!(entity_id = %vehicle.id, "Duplicate id in snapshot, ignoring");
        }
    }

    out
}

/// Classify one inbound text frame into a closed set of message variants
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = match &value {
        Value::Object(map) => match map.get("type").and_then(|t| t.as_str()) {
            Some(kind) => kind.to_string(),
            None => return Err(ProtocolError::MissingType),
        },
        _ => return Err(ProtocolError::NotObject),
    };

    match kind.as_str() {
        "state_update" => {
            let p: StateUpdatePayload = payload(&kind, value)?;
            Ok(ServerMessage::StateUpdate(Snapshot {
                entities: descriptors(p.vehicles),
                signal: Some(p.signal),
                sim_time: p.sim_time,
            }))
        }
        "vehicle_update" => {
            let p: VehicleUpdatePayload = payload(&kind, value)?;
            Ok(ServerMessage::VehicleUpdate(Snapshot {
                entities: descriptors(p.vehicles),
                signal: None,
                sim_time: p.sim_time,
            }))
        }
        "sim_restart" => Ok(ServerMessage::SimRestart(payload(&kind, value)?)),
        "sim_complete" => Ok(ServerMessage::SimComplete(payload(&kind, value)?)),
        _ => Err(ProtocolError::UnknownType(kind)),
    }
}

/// Intersection approach a command refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    North,
    South,
    East,
    West,
}

impl std::str::FromStr for Approach {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "north" => Ok(Approach::North),
            "south" => Ok(Approach::South),
            "east" => Ok(Approach::East),
            "west" => Ok(Approach::West),
            other => Err(format!("unknown approach '{}'", other)),
        }
    }
}

/// Client → producer commands
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum ClientCommand {
    /// Request a green phase for the given approach
    #[serde(rename = "force_green")]
    ForceGreen { approach: Approach },
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::ForceGreen { .. } => "force_green",
        }
    }
}
