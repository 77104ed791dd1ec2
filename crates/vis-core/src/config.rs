//! Service configuration.
//!
//! The configuration is a JSON document describing the seeded signals, the
//! publicly readable path patterns and the tuning of the serialized provider
//! loop. Every section is optional; missing sections fall back to defaults.
//!
//! ```json
//! {
//!   "dataPoints": [
//!     { "path": "Signal.Drivetrain.InternalCombustionEngine.RPM", "value": 2372, "initialized": true }
//!   ],
//!   "publicPaths": ["Signal.Drivetrain.*"],
//!   "provider": { "sendTimeoutMs": 100, "maxConsecutiveTimeouts": 3 },
//!   "httpAddr": "0.0.0.0:3001"
//! }
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::DataPoint;
use crate::path::PathPattern;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration parsed but its content is inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisConfig {
    /// Signals known to the store, with their seed values.
    pub data_points: Vec<DataPoint>,

    /// Path patterns readable and subscribable without further checks.
    pub public_paths: Vec<String>,

    /// Provider loop tuning.
    pub provider: ProviderSettings,

    /// Address of the HTTP lookup endpoint.
    pub http_addr: SocketAddr,
}

impl Default for VisConfig {
    fn default() -> Self {
        Self {
            data_points: default_data_points(),
            public_paths: vec![
                "Attribute.Vehicle.VehicleIdentification.VIN".to_string(),
                "Attribute.Vehicle.UserIdentification.Users".to_string(),
                "Signal.Drivetrain.InternalCombustionEngine.Power".to_string(),
            ],
            provider: ProviderSettings::default(),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
        }
    }
}

/// Tuning for the serialized provider loop and subscriber delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Capacity of the query request queue.
    pub request_capacity: usize,

    /// Capacity of the update batch queue fed by data-source adapters.
    pub update_capacity: usize,

    /// How long a single notification may wait for room on a subscriber channel.
    pub send_timeout_ms: u64,

    /// Consecutive delivery timeouts after which a channel is unsubscribed.
    pub max_consecutive_timeouts: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_capacity: 64,
            update_capacity: 100,
            send_timeout_ms: 100,
            max_consecutive_timeouts: 3,
        }
    }
}

/// The signals every vehicle exposes out of the box.
fn default_data_points() -> Vec<DataPoint> {
    vec![
        DataPoint::new("Attribute.Vehicle.UserIdentification.Users", vec!["User1"])
            .with_initialized(true),
        DataPoint::new("Attribute.Vehicle.VehicleIdentification.VIN", "1234567890QWERTYU")
            .with_initialized(true),
        DataPoint::new("Signal.Drivetrain.InternalCombustionEngine.RPM", 2372).with_initialized(true),
        DataPoint::new("Signal.Drivetrain.InternalCombustionEngine.Power", 60).with_initialized(true),
    ]
}

impl VisConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: VisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the content for inconsistencies serde cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for point in &self.data_points {
            let pattern = PathPattern::new(&point.path).map_err(|e| {
                ConfigError::Invalid(format!("data point path '{}': {}", point.path, e))
            })?;
            if pattern.has_wildcard() {
                return Err(ConfigError::Invalid(format!(
                    "data point path '{}' must not contain wildcards",
                    point.path
                )));
            }
            if !seen.insert(point.path.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate data point path '{}'",
                    point.path
                )));
            }
        }

        for public in &self.public_paths {
            PathPattern::new(public).map_err(|e| {
                ConfigError::Invalid(format!("public path '{}': {}", public, e))
            })?;
        }

        let provider = &self.provider;
        if provider.request_capacity == 0 || provider.update_capacity == 0 {
            return Err(ConfigError::Invalid(
                "provider queue capacities must be greater than zero".to_string(),
            ));
        }
        if provider.max_consecutive_timeouts == 0 {
            return Err(ConfigError::Invalid(
                "maxConsecutiveTimeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
