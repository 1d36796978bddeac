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

//! Message payloads carried by the [`TelemetryBus`](crate::TelemetryBus).
//!
//! Every message is a small immutable value. The bus never retains them; a
//! subscriber that needs history keeps its own copy.

use crate::gear::Gear;
use cluster_core::math::Vec2;
use serde::Serialize;

/// Vehicle speed changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedChanged {
    /// Speed in km/h.
    pub kmh: f32,
}

/// Engine speed changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RpmChanged {
    /// Engine speed in revolutions per minute.
    pub rpm: f32,
}

/// Visual body roll changed. Positive rolls to the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollChanged {
    /// Roll angle in degrees.
    pub deg: f32,
}

/// Acceleration vector changed, in standard gravities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GChanged {
    /// Lateral component, positive to the right.
    pub lateral: f32,
    /// Longitudinal component, positive when speeding up.
    pub longitudinal: f32,
}

impl GChanged {
    /// The reading as a vector (`x` lateral, `y` longitudinal).
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.lateral, self.longitudinal)
    }
}

impl From<Vec2> for GChanged {
    fn from(g: Vec2) -> Self {
        Self {
            lateral: g.x,
            longitudinal: g.y,
        }
    }
}

/// The vehicle accepted a selector change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GearSelectorChanged {
    /// The new selector position.
    pub gear: Gear,
}

/// The automatic gearbox picked a new gear while in Drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveGearChanged {
    /// Gear number, 1 to 7.
    pub numeric_gear: u8,
}

/// The vehicle refused a selector change because it was moving too fast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GearChangeRejected {
    /// The refused position.
    pub requested: Gear,
    /// The position that stays engaged.
    pub current: Gear,
    /// Vehicle speed at the time of the request, in km/h.
    pub speed_kph: f32,
}

/// The speed limit or the over-limit state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpeedLimitChanged {
    /// Active limit in km/h.
    pub limit_kmh: u16,
    /// `true` while the vehicle is above the limit.
    pub over_limit: bool,
}
