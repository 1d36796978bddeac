// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cluster configuration, loaded from TOML.
//!
//! Every section and every field is optional; anything left out takes the
//! stock value.
//!
//! ```toml
//! [vehicle]
//! v_max_forward_kph = 180.0
//!
//! [shift]
//! upshift_kph = [30.0, 55.0, 85.0, 115.0, 145.0, 170.0, 185.0]
//!
//! [speed_limit]
//! initial_kmh = 50
//! ```

use crate::gearbox::{ScheduleError, ShiftSchedule};
use crate::inclinometer::PitchParams;
use crate::speed_limit::SpeedLimitParams;
use crate::vehicle::{VehicleParams, VehicleParamsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading or validating a [`ClusterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path:?}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The TOML was malformed or had wrongly typed fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The shift schedule is unusable.
    #[error("invalid shift schedule: {0}")]
    Schedule(#[from] ScheduleError),
    /// A vehicle parameter is out of range.
    #[error("invalid vehicle parameters: {0}")]
    InvalidVehicle(#[from] VehicleParamsError),
}

/// All tunables of the cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Vehicle model.
    pub vehicle: VehicleParams,
    /// Automatic gearbox thresholds.
    pub shift: ShiftSchedule,
    /// Inclinometer.
    pub pitch: PitchParams,
    /// Speed-limit indicator.
    pub speed_limit: SpeedLimitParams,
}

impl ClusterConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded cluster config from {}", path.display());
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vehicle.validate()?;
        self.shift.validate()?;
        Ok(())
    }
}
