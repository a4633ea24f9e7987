// Snapshot reconciliation: spawn/update/despawn against a bounded pool

mod config;
mod entity;

pub use config::ReconcileConfig;
pub use entity::{EntityReadout, FrameState, LifecycleState, TrackedEntity};

use crate::mapping::{CoordinateMapper, MappingConfig, MappingError};
use crate::pool::{EntityPool, PoolConfig};
use crate::protocol::{SignalState, Snapshot};
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};


/// Counters for observability
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReconcileStats {
    pub snapshots_applied: u64,
    pub spawned: u64,
    pub despawned: u64,
    pub despawns_cancelled: u64,
    /// Arrivals dropped because the pool was full
    pub capacity_drops: u64,
}

/// Owns the live entity set, the render pool and per-entity interpolation
pub struct ReconciliationEngine {
    entities: HashMap<String, TrackedEntity>,
    pool: EntityPool,
    mapper: CoordinateMapper,
    config: ReconcileConfig,
    signal: Option<SignalState>,
    sim_time: f64,
    stats: ReconcileStats,
}

impl ReconciliationEngine {
    pub fn new(mapper: CoordinateMapper, pool: EntityPool, config: ReconcileConfig) -> Self {
        Self {
            entities: HashMap::new(),
            pool,
            mapper,
            config,
            signal: None,
            sim_time: 0.0,
            stats: ReconcileStats::default(),
        }
    }

    /// Build an engine from configuration sections
    pub fn from_config(
        mapping: &MappingConfig,
        pool: &PoolConfig,
        reconcile: &ReconcileConfig,
    ) -> Result<Self, MappingError> {
        Ok(Self::new(
            mapping.build()?,
            EntityPool::new(pool),
            reconcile.clone(),
        ))
    }

    /// Diff a snapshot against the tracked set.
    ///
    /// Known ids get new targets, unknown ids spawn if the pool allows,
    /// missing ids start fading out. Render state is left to `advance`.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        let present: HashSet<&str> = snapshot.entities.iter().map(|e| e.id.as_str()).collect();
        let mut dropped = 0u64;

        for descriptor in &snapshot.entities {
            let target = self.mapper.map_position(descriptor.position);
            let heading = self.mapper.map_heading(descriptor.heading);

            if let Some(entity) = self.entities.get_mut(&descriptor.id) {
                entity.retarget(descriptor, target, heading);
                if entity.state() == LifecycleState::Despawning {
                    entity.cancel_despawn();
                    self.stats.despawns_cancelled += 1;
                    debug!(entity_id = %descriptor.id, "Despawn cancelled");
                }
                continue;
            }

            match self.pool.acquire(descriptor.class) {
                Some(handle) => {
                    let entity = TrackedEntity::spawn(descriptor, handle, target, heading);
                    self.entities.insert(descriptor.id.clone(), entity);
                    self.stats.spawned += 1;
                }
                None => dropped += 1,
            }
        }

        for entity in self.entities.values_mut() {
            if entity.state() != LifecycleState::Despawning && !present.contains(entity.id()) {
                entity.begin_despawn();
            }
        }

        if dropped > 0 {
            self.stats.capacity_drops += dropped;
            debug!(
                dropped = dropped,
                live = self.pool.live(),
                max_live = self.pool.max_live(),
                "Pool at capacity, arrivals dropped"
            );
        }

        if let Some(signal) = &snapshot.signal {
            self.signal = Some(signal.clone());
        }
        self.sim_time = snapshot.sim_time;
        self.stats.snapshots_applied += 1;
    }

    /// Advance fades and interpolation by `delta_seconds` of wall time
    pub fn advance(&mut self, delta_seconds: f64) {
        let dt = if delta_seconds.is_finite() && delta_seconds > 0.0 {
            delta_seconds
        } else {
            0.0
        };

        let fade = (self.config.fade_rate * dt) as f32;
        let position_blend = 1.0 - (-self.config.position_rate * dt).exp();
        let heading_blend = 1.0 - (-self.config.heading_rate * dt).exp();

        let mut faded_out = Vec::new();

        for (id, entity) in self.entities.iter_mut() {
            if entity.fade(fade) {
                faded_out.push(id.clone());
                continue;
            }
            entity.interpolate(position_blend, heading_blend);
            self.pool.visual_mut(entity.handle()).alpha = entity.opacity();
        }

        for id in faded_out {
            if let Some(entity) = self.entities.remove(&id) {
                self.pool.release(entity.into_handle());
                self.stats.despawned += 1;
                debug!(entity_id = %id, "Entity despawned");
            }
        }
    }

    /// Drop every tracked entity at once, skipping fade-out
    pub fn clear(&mut self) {
        let count = self.entities.len();
        for (_, entity) in self.entities.drain() {
            self.pool.release(entity.into_handle());
        }
        self.signal = None;
        self.sim_time = 0.0;
        self.stats = ReconcileStats::default();

        info!(cleared = count, "Tracked entities cleared");
    }

    /// Per-entity render state ordered by id, plus the latest signal state
    pub fn readout(&self) -> FrameState {
        let mut entities: Vec<EntityReadout> = self
            .entities
            .values()
            .map(|e| EntityReadout {
                id: e.id().to_string(),
                slot: e.slot(),
                render_position: e.render_position(),
                render_heading: e.render_heading(),
                opacity: e.opacity(),
                class: e.class(),
                state: e.state(),
                speed: e.speed(),
                kind: e.kind().to_string(),
                edge: e.edge().to_string(),
                visual: *self.pool.visual(e.handle()),
            })
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        FrameState {
            entities,
            signal: self.signal.clone(),
            sim_time: self.sim_time,
            captured_at: Utc::now(),
        }
    }

    pub fn tracked(&self, id: &str) -> Option<&TrackedEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn signal(&self) -> Option<&SignalState> {
        self.signal.as_ref()
    }

    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }
}
