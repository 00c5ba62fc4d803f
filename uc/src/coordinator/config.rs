//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Label used in logs and events
    #[serde(default = "default_name")]
    pub name: String,

    /// Seconds between automatic refreshes
    #[serde(rename = "update-interval-secs", default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Upper bound on a single fetch, in seconds
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Notify observers after every refresh, even when nothing changed
    #[serde(rename = "always-update", default = "default_always_update")]
    pub always_update: bool,

    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Capacity of the broadcast event channel
    #[serde(rename = "event-capacity", default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_name() -> String {
    "coordinator".to_string()
}

fn default_update_interval_secs() -> u64 {
    debug!("default_update_interval_secs: called");
    30
}

fn default_fetch_timeout_secs() -> u64 {
    debug!("default_fetch_timeout_secs: called");
    10
}

fn default_always_update() -> bool {
    true
}

fn default_channel_buffer() -> usize {
    64
}

fn default_event_capacity() -> usize {
    256
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            name: default_name(),
            update_interval_secs: 30,
            fetch_timeout_secs: 10,
            always_update: true,
            channel_buffer: 64,
            event_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Config with the given name and defaults for everything else
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the update interval as a Duration; zero is treated as one second
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(1))
    }

    /// Get the fetch timeout as a Duration; zero is treated as one second
    pub fn fetch_timeout(&self) -> Duration {
        debug!(fetch_timeout_secs = %self.fetch_timeout_secs, "CoordinatorConfig::fetch_timeout: called");
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.name, "coordinator");
        assert_eq!(config.update_interval_secs, 30);
        assert_eq!(config.fetch_timeout_secs, 10);
        assert!(config.always_update);
        assert_eq!(config.channel_buffer, 64);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_durations() {
        let config = CoordinatorConfig {
            update_interval_secs: 60,
            fetch_timeout_secs: 5,
            ..Default::default()
        };
        assert_eq!(config.update_interval(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_durations_floor_at_one_second() {
        let config = CoordinatorConfig {
            update_interval_secs: 0,
            fetch_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.update_interval(), Duration::from_secs(1));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
name: thermostat
always-update: false
"#;
        let config: CoordinatorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "thermostat");
        assert!(!config.always_update);
        assert_eq!(config.update_interval_secs, 30);
        assert_eq!(config.fetch_timeout_secs, 10);
    }
}
