use super::{AxisMapping, CoordinateMapper, MappingError};
use serde::{Deserialize, Serialize};

/// Producer → scene mapping parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Producer-space junction centre
    #[serde(default = "default_origin")]
    pub origin_x: f64,
    #[serde(default = "default_origin")]
    pub origin_y: f64,

    /// Hot-zone half-widths in producer units (x, and y → scene z)
    #[serde(default = "default_hot_half_width_x")]
    pub hot_half_width_x: f64,
    #[serde(default = "default_hot_half_width_z")]
    pub hot_half_width_z: f64,

    /// Cold-zone lengths in producer units
    #[serde(default = "default_cold_length_x")]
    pub cold_length_x: f64,
    #[serde(default = "default_cold_length_z")]
    pub cold_length_z: f64,

    /// Scene hot-zone half-width (both axes)
    #[serde(default = "default_scene_hot_half")]
    pub scene_hot_half: f64,

    /// Scene road-arm length (both axes)
    #[serde(default = "default_scene_cold_length")]
    pub scene_cold_length: f64,

    /// Subtracted from producer headings (degrees)
    #[serde(default)]
    pub heading_offset_deg: f64,

    /// Scene y for every entity
    #[serde(default)]
    pub ground_height: f64,
}

fn default_origin() -> f64 {
    500.0
}

fn default_hot_half_width_x() -> f64 {
    10.4
}

fn default_hot_half_width_z() -> f64 {
    7.2
}

fn default_cold_length_x() -> f64 {
    489.6
}

fn default_cold_length_z() -> f64 {
    492.8
}

fn default_scene_hot_half() -> f64 {
    4.0
}

fn default_scene_cold_length() -> f64 {
    30.0
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            origin_x: default_origin(),
            origin_y: default_origin(),
            hot_half_width_x: default_hot_half_width_x(),
            hot_half_width_z: default_hot_half_width_z(),
            cold_length_x: default_cold_length_x(),
            cold_length_z: default_cold_length_z(),
            scene_hot_half: default_scene_hot_half(),
            scene_cold_length: default_scene_cold_length(),
            heading_offset_deg: 0.0,
            ground_height: 0.0,
        }
    }
}

impl MappingConfig {
    /// Build the mapper described by this configuration
    pub fn build(&self) -> Result<CoordinateMapper, MappingError> {
        let x = AxisMapping {
            origin: self.origin_x,
            hot_half_width: self.hot_half_width_x,
            cold_length: self.cold_length_x,
            scene_hot_half: self.scene_hot_half,
            scene_cold_length: self.scene_cold_length,
        };
        let z = AxisMapping {
            origin: self.origin_y,
            hot_half_width: self.hot_half_width_z,
            cold_length: self.cold_length_z,
            scene_hot_half: self.scene_hot_half,
            scene_cold_length: self.scene_cold_length,
        };

        CoordinateMapper::new(x, z, self.heading_offset_deg, self.ground_height)
    }
}
