use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;


pub use config::MappingConfig;

/// Position in producer space (simulation metres, y pointing north)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProducerPoint {
    pub x: f64,
    pub y: f64,
}

impl ProducerPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position in consumer (scene) space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenePoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ScenePoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Dual-scale mapping parameters for one axis
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisMapping {
    /// Producer-space origin coordinate on this axis
    pub origin: f64,
    /// Half-width of the hot zone (junction) in producer units
    pub hot_half_width: f64,
    /// Length of the cold zone (road arm) beyond the hot zone, producer units
    pub cold_length: f64,
    /// Half-width of the hot zone in scene units
    pub scene_hot_half: f64,
    /// Length of the road arm in scene units
    pub scene_cold_length: f64,
}

impl AxisMapping {
    /// Map one producer coordinate onto the scene axis.
    ///
    /// Piecewise linear: the hot zone scales so its edge lands exactly on the
    /// scene hot-zone edge, the remainder scales so the cold-zone end lands on
    /// the scene arm length. Continuous and strictly monotonic.
    pub fn map(&self, value: f64) -> f64 {
        let d = value - self.origin;
        let magnitude = d.abs();

        let mapped = if magnitude <= self.hot_half_width {
            magnitude * (self.scene_hot_half / self.hot_half_width)
        } else {
            self.scene_hot_half
                + (magnitude - self.hot_half_width) * (self.scene_cold_length / self.cold_length)
        };

        // signum(0.0) is 1.0, which is harmless here since mapped is 0.0
        d.signum() * mapped
    }

    fn validate(&self, axis: &'static str) -> Result<(), MappingError> {
        let positive = [
            ("hot_half_width", self.hot_half_width),
            ("cold_length", self.cold_length),
            ("scene_hot_half", self.scene_hot_half),
            ("scene_cold_length", self.scene_cold_length),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(MappingError::NonPositive { axis, field, value });
            }
        }

        if !self.origin.is_finite() {
            return Err(MappingError::NonFiniteOrigin { axis });
        }

        Ok(())
    }
}

/// Configuration errors for the coordinate mapper
#[derive(Debug, Clone, PartialEq)]
pub enum MappingError {
    NonPositive {
        axis: &'static str,
        field: &'static str,
        value: f64,
    },
    NonFiniteOrigin {
        axis: &'static str,
    },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::NonPositive { axis, field, value } => {
                write!(f, "{} axis: {} must be positive, got {}", axis, field, value)
            }
            MappingError::NonFiniteOrigin { axis } => {
                write!(f, "{} axis: origin must be finite", axis)
            }
        }
    }
}

impl std::error::Error for MappingError {}

/// Stateless producer → scene transform.
///
/// Producer x maps onto scene x, producer y onto scene z; scene y is the
/// configured ground height.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateMapper {
    x: AxisMapping,
    z: AxisMapping,
    heading_offset_deg: f64,
    ground_height: f64,
}

impl CoordinateMapper {
    /// Build a mapper, rejecting degenerate axis parameters
    pub fn new(
        x: AxisMapping,
        z: AxisMapping,
        heading_offset_deg: f64,
        ground_height: f64,
    ) -> Result<Self, MappingError> {
        x.validate("x")?;
        z.validate("z")?;

        Ok(Self {
            x,
            z,
            heading_offset_deg,
            ground_height,
        })
    }

    pub fn map_position(&self, point: ProducerPoint) -> ScenePoint {
        ScenePoint {
            x: self.x.map(point.x),
            y: self.ground_height,
            z: self.z.map(point.y),
        }
    }

    /// Producer heading (degrees) to scene heading, normalized to (-180, 180]
    pub fn map_heading(&self, heading_deg: f64) -> f64 {
        normalize_degrees(heading_deg - self.heading_offset_deg)
    }

    pub fn x_axis(&self) -> &AxisMapping {
        &self.x
    }

    pub fn z_axis(&self) -> &AxisMapping {
        &self.z
    }
}

/// Wrap an angle in degrees into (-180, 180]
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in degrees
pub fn shortest_arc(from: f64, to: f64) -> f64 {
    normalize_degrees(to - from)
}
