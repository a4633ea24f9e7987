use serde::{Deserialize, Serialize};

/// Producer connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket URL of the simulation producer
    #[serde(default = "default_url")]
    pub url: String,

    /// Delay between a failed attempt and the next one (seconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,

    /// Give up on an attempt that has not opened after this long (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: f64,

    /// Consecutive failed attempts before giving up; -1 retries forever
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: i64,
}

fn default_url() -> String {
    std::env::var("JUNCTION_URL").unwrap_or_else(|_| "ws://localhost:8765".to_string())
}

fn default_retry_delay() -> f64 {
    3.0
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_max_reconnect_attempts() -> i64 {
    -1
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            retry_delay_seconds: default_retry_delay(),
            connect_timeout_seconds: default_connect_timeout(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl ConnectionConfig {
    /// Attempt limit, or `None` when retrying forever
    pub fn attempt_limit(&self) -> Option<u32> {
        if self.max_reconnect_attempts < 0 {
            None
        } else {
            Some(self.max_reconnect_attempts.min(u32::MAX as i64) as u32)
        }
    }
}
