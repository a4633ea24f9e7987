use serde::{Deserialize, Serialize};

/// Timing of fades and interpolation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Opacity change per second while spawning or despawning
    #[serde(default = "default_fade_rate")]
    pub fade_rate: f64,

    /// Exponential approach rate for positions (1/s)
    #[serde(default = "default_position_rate")]
    pub position_rate: f64,

    /// Exponential approach rate for headings (1/s)
    #[serde(default = "default_heading_rate")]
    pub heading_rate: f64,
}

fn default_fade_rate() -> f64 {
    2.0
}

fn default_position_rate() -> f64 {
    10.0
}

fn default_heading_rate() -> f64 {
    10.0
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fade_rate: default_fade_rate(),
            position_rate: default_position_rate(),
            heading_rate: default_heading_rate(),
        }
    }
}
