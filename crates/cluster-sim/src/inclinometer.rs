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

//! Road pitch source driven by the driver's nose-up / nose-down controls.

use crate::gear::Gear;
use cluster_core::math;
use serde::{Deserialize, Serialize};

/// Tunables of the [`PitchController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchParams {
    /// Largest pitch magnitude, degrees.
    pub max_abs_deg: f32,
    /// Target travel under input, degrees per second.
    pub rate_deg_per_s: f32,
    /// Target return to level without input, degrees per second.
    pub return_rate_deg_per_s: f32,
    /// Smoothing rate of the shown value, per second.
    pub follow: f32,
    /// Minimum speed for nose-up input, km/h.
    pub speed_eps_kph: f32,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self {
            max_abs_deg: 30.0,
            rate_deg_per_s: 30.0,
            return_rate_deg_per_s: 45.0,
            follow: 10.0,
            speed_eps_kph: 0.1,
        }
    }
}

/// Integrates the driver's pitch controls into a smoothed road pitch.
///
/// Positive values are nose-up (uphill).
#[derive(Debug, Clone, Default)]
pub struct PitchController {
    params: PitchParams,
    target_deg: f32,
    shown_deg: f32,
}

impl PitchController {
    /// Creates a level controller.
    pub fn new(params: PitchParams) -> Self {
        Self {
            params,
            target_deg: 0.0,
            shown_deg: 0.0,
        }
    }

    /// Advances by `dt` seconds and returns the new pitch.
    ///
    /// Nose-up is honoured only in Drive while moving; nose-down in Drive or
    /// Neutral. In Neutral the pitch can only point downhill.
    pub fn update(&mut self, dt: f32, gear: Gear, speed_kph: f32, nose_up: bool, nose_down: bool) -> f32 {
        if !dt.is_finite() || dt < 0.0 {
            return self.shown_deg;
        }
        let p = &self.params;
        let up = nose_up && gear == Gear::Drive && speed_kph > p.speed_eps_kph;
        let down = nose_down && matches!(gear, Gear::Drive | Gear::Neutral);

        if up {
            self.target_deg += p.rate_deg_per_s * dt;
        }
        if down {
            self.target_deg -= p.rate_deg_per_s * dt;
        }
        if !up && !down {
            self.target_deg = math::move_towards(self.target_deg, 0.0, p.return_rate_deg_per_s * dt);
        }

        let upper = if gear == Gear::Neutral { 0.0 } else { p.max_abs_deg };
        self.target_deg = math::clamp(self.target_deg, -p.max_abs_deg, upper);
        self.shown_deg = math::lerp(self.shown_deg, self.target_deg, dt * p.follow);
        self.shown_deg
    }

    /// The smoothed pitch, degrees, positive nose-up.
    pub fn pitch_deg(&self) -> f32 {
        self.shown_deg
    }

    /// The unsmoothed target, degrees.
    pub fn target_deg(&self) -> f32 {
        self.target_deg
    }
}
