use crate::protocol::EntityClass;
use serde::{Deserialize, Serialize};
use tracing::debug;


/// RGB tint, components in [0, 1]
pub type Tint = [f32; 3];

/// Tint every resource is reset to
pub const NEUTRAL_TINT: Tint = [1.0, 1.0, 1.0];

/// Tint applied to priority-class vehicles
pub const PRIORITY_TINT: Tint = [0.9, 0.1, 0.1];

/// Rotating palette for standard vehicles
pub const STANDARD_PALETTE: [Tint; 6] = [
    [0.20, 0.45, 0.85],
    [0.95, 0.95, 0.95],
    [0.15, 0.15, 0.18],
    [0.75, 0.75, 0.78],
    [0.95, 0.75, 0.15],
    [0.25, 0.60, 0.35],
];

/// Visual state of one pooled render resource.
///
/// This is what the presentation layer applies to its scene node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderVisual {
    pub alpha: f32,
    pub tint: Tint,
    pub scale: f32,
    pub visible: bool,
}

impl RenderVisual {
    pub fn neutral() -> Self {
        Self {
            alpha: 0.0,
            tint: NEUTRAL_TINT,
            scale: 1.0,
            visible: false,
        }
    }
}

impl Default for RenderVisual {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Capacity limits for the pool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum standard-class handles
    #[serde(default = "default_standard_capacity")]
    pub standard_capacity: usize,

    /// Maximum priority-class handles
    #[serde(default = "default_priority_capacity")]
    pub priority_capacity: usize,

    /// Maximum handles checked out across both classes
    #[serde(default = "default_max_live")]
    pub max_live: usize,

    /// Scale multiplier for priority vehicles
    #[serde(default = "default_priority_scale")]
    pub priority_scale: f32,
}

fn default_standard_capacity() -> usize {
    200
}

fn default_priority_capacity() -> usize {
    16
}

fn default_max_live() -> usize {
    200
}

fn default_priority_scale() -> f32 {
    1.2
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            standard_capacity: default_standard_capacity(),
            priority_capacity: default_priority_capacity(),
            max_live: default_max_live(),
            priority_scale: default_priority_scale(),
        }
    }
}

/// Exclusive claim on one pooled render resource.
///
/// Neither `Clone` nor `Copy`; the only way to get one is
/// `EntityPool::acquire`, and `release` consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct PooledHandle {
    class: EntityClass,
    slot: usize,
}

impl PooledHandle {
    pub fn class(&self) -> EntityClass {
        self.class
    }

    /// Index of the underlying resource within its class
    pub fn slot(&self) -> usize {
        self.slot
    }
}

#[derive(Debug)]
struct ClassPool {
    resources: Vec<RenderVisual>,
    free: Vec<usize>,
    capacity: usize,
}

impl ClassPool {
    fn new(capacity: usize) -> Self {
        Self {
            resources: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    fn checked_out(&self) -> usize {
        self.resources.len() - self.free.len()
    }

    fn take(&mut self) -> Option<usize> {
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }
        if self.resources.len() < self.capacity {
            self.resources.push(RenderVisual::neutral());
            return Some(self.resources.len() - 1);
        }
        None
    }
}

/// Bounded, class-partitioned pool of reusable render resources
#[derive(Debug)]
pub struct EntityPool {
    standard: ClassPool,
    priority: ClassPool,
    max_live: usize,
    priority_scale: f32,
    palette_cursor: usize,
}

impl EntityPool {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            standard: ClassPool::new(config.standard_capacity),
            priority: ClassPool::new(config.priority_capacity),
            max_live: config.max_live,
            priority_scale: config.priority_scale,
            palette_cursor: 0,
        }
    }

    fn class_pool(&self, class: EntityClass) -> &ClassPool {
        match class {
            EntityClass::Standard => &self.standard,
            EntityClass::Priority => &self.priority,
        }
    }

    fn class_pool_mut(&mut self, class: EntityClass) -> &mut ClassPool {
        match class {
            EntityClass::Standard => &mut self.standard,
            EntityClass::Priority => &mut self.priority,
        }
    }

    /// Check out a handle for `class`, or `None` when at capacity.
    ///
    /// The resource is reset to neutral and then configured for the class
    /// before it is handed out.
    pub fn acquire(&mut self, class: EntityClass) -> Option<PooledHandle> {
        if self.live() >= self.max_live {
            return None;
        }

        let slot = self.class_pool_mut(class).take()?;

        let configured = self.configure(class);
        self.class_pool_mut(class).resources[slot] = configured;

        debug!(class = ?class, slot = slot, "Acquired pooled handle");
        Some(PooledHandle { class, slot })
    }

    /// Return a handle; its resource is reset and immediately reusable
    pub fn release(&mut self, handle: PooledHandle) {
        let pool = self.class_pool_mut(handle.class);
        pool.resources[handle.slot] = RenderVisual::neutral();
        pool.free.push(handle.slot);

        debug!(class = ?handle.class, slot = handle.slot, "Released pooled handle");
    }

    fn configure(&mut self, class: EntityClass) -> RenderVisual {
        let mut visual = RenderVisual::neutral();
        visual.visible = true;

        match class {
            EntityClass::Priority => {
                visual.tint = PRIORITY_TINT;
                visual.scale = self.priority_scale;
            }
            EntityClass::Standard => {
                visual.tint = STANDARD_PALETTE[self.palette_cursor % STANDARD_PALETTE.len()];
                self.palette_cursor = self.palette_cursor.wrapping_add(1);
            }
        }

        visual
    }

    pub fn visual(&self, handle: &PooledHandle) -> &RenderVisual {
        &self.class_pool(handle.class).resources[handle.slot]
    }

    pub fn visual_mut(&mut self, handle: &PooledHandle) -> &mut RenderVisual {
        &mut self.class_pool_mut(handle.class).resources[handle.slot]
    }

    /// Handles of `class` currently checked out
    pub fn checked_out(&self, class: EntityClass) -> usize {
        self.class_pool(class).checked_out()
    }

    /// Handles of `class` sitting on the free list
    pub fn free(&self, class: EntityClass) -> usize {
        self.class_pool(class).free.len()
    }

    pub fn capacity(&self, class: EntityClass) -> usize {
        self.class_pool(class).capacity
    }

    /// Handles checked out across both classes
    pub fn live(&self) -> usize {
        self.standard.checked_out() + self.priority.checked_out()
    }

    pub fn max_live(&self) -> usize {
        self.max_live
    }

    /// Whether `acquire(class)` would currently succeed
    pub fn has_capacity(&self, class: EntityClass) -> bool {
        if self.live() >= self.max_live {
            return false;
        }
        let pool = self.class_pool(class);
        !pool.free.is_empty() || pool.resources.len() < pool.capacity
    }
}
