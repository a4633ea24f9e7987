use crate::mapping::{normalize_degrees, shortest_arc, ScenePoint};
use crate::pool::{PooledHandle, RenderVisual};
use crate::protocol::{EntityClass, EntityDescriptor, SignalState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a tracked entity is in its visible lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Fading in after first sighting
    Spawning,
    /// Fully visible
    Active,
    /// Gone from the latest snapshot, fading out
    Despawning,
}

/// Local record correlating a producer id with a pooled render handle
#[derive(Debug)]
pub struct TrackedEntity {
    id: String,
    handle: PooledHandle,
    class: EntityClass,
    render_position: ScenePoint,
    render_heading: f64,
    target_position: ScenePoint,
    target_heading: f64,
    opacity: f32,
    state: LifecycleState,
    speed: f64,
    kind: String,
    edge: String,
}

impl TrackedEntity {
    /// First sighting: render state snaps straight to the target
    pub(crate) fn spawn(
        descriptor: &EntityDescriptor,
        handle: PooledHandle,
        position: ScenePoint,
        heading: f64,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            class: handle.class(),
            handle,
            render_position: position,
            render_heading: heading,
            target_position: position,
            target_heading: heading,
            opacity: 0.0,
            state: LifecycleState::Spawning,
            speed: descriptor.speed,
            kind: descriptor.kind.clone(),
            edge: descriptor.edge.clone(),
        }
    }

    pub(crate) fn retarget(
        &mut self,
        descriptor: &EntityDescriptor,
        position: ScenePoint,
        heading: f64,
    ) {
        self.target_position = position;
        self.target_heading = heading;
        self.speed = descriptor.speed;
        self.edge.clone_from(&descriptor.edge);
    }

    pub(crate) fn begin_despawn(&mut self) {
        self.state = LifecycleState::Despawning;
    }

    /// Resume from a despawn without passing through zero opacity
    pub(crate) fn cancel_despawn(&mut self) {
        self.state = if self.opacity >= 1.0 {
            LifecycleState::Active
        } else {
            LifecycleState::Spawning
        };
    }

    /// Step the fade. Returns true once a despawn has fully faded out.
    pub(crate) fn fade(&mut self, amount: f32) -> bool {
        match self.state {
            LifecycleState::Spawning => {
                self.opacity = (self.opacity + amount).min(1.0);
                if self.opacity >= 1.0 {
                    self.state = LifecycleState::Active;
                }
                false
            }
            LifecycleState::Active => false,
            LifecycleState::Despawning => {
                self.opacity = (self.opacity - amount).max(0.0);
                self.opacity <= 0.0
            }
        }
    }

    /// Move render state toward the target by the given blend factors in [0, 1]
    pub(crate) fn interpolate(&mut self, position_blend: f64, heading_blend: f64) {
        let p = &mut self.render_position;
        let t = self.target_position;
        p.x += (t.x - p.x) * position_blend;
        p.y += (t.y - p.y) * position_blend;
        p.z += (t.z - p.z) * position_blend;

        let delta = shortest_arc(self.render_heading, self.target_heading);
        self.render_heading = normalize_degrees(self.render_heading + delta * heading_blend);
    }

    pub(crate) fn handle(&self) -> &PooledHandle {
        &self.handle
    }

    pub(crate) fn into_handle(self) -> PooledHandle {
        self.handle
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    /// Pool slot backing this entity
    pub fn slot(&self) -> usize {
        self.handle.slot()
    }

    pub fn render_position(&self) -> ScenePoint {
        self.render_position
    }

    pub fn render_heading(&self) -> f64 {
        self.render_heading
    }

    pub fn target_position(&self) -> ScenePoint {
        self.target_position
    }

    pub fn target_heading(&self) -> f64 {
        self.target_heading
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Producer road id the entity was last reported on
    pub fn edge(&self) -> &str {
        &self.edge
    }
}

/// Normalized per-entity state handed to presentation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityReadout {
    pub id: String,
    /// Pool slot within `class`; stable for the entity's lifetime
    pub slot: usize,
    pub render_position: ScenePoint,
    pub render_heading: f64,
    pub opacity: f32,
    pub class: EntityClass,
    pub state: LifecycleState,
    pub speed: f64,
    pub kind: String,
    pub edge: String,
    pub visual: RenderVisual,
}

/// Everything presentation needs for one frame
#[derive(Clone, Debug, Serialize)]
pub struct FrameState {
    pub entities: Vec<EntityReadout>,
    /// Latest signal/metrics from a full state update
    pub signal: Option<SignalState>,
    pub sim_time: f64,
    pub captured_at: DateTime<Utc>,
}
