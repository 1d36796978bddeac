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

//! Tunables of the vehicle model.

use crate::gear::Gear;
use cluster_core::math::STANDARD_GRAVITY;
use serde::{Deserialize, Serialize};

/// One band of the forward acceleration curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelBand {
    /// The band applies strictly below this speed, in km/h.
    pub below_kph: f32,
    /// Acceleration inside the band, in km/h per second.
    pub accel_kph_per_s: f32,
}

/// Every constant of the vehicle model, in the units of the cluster
/// (km/h, rpm, degrees, seconds).
///
/// Missing fields deserialize to the stock values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Top speed in P, N and D.
    pub v_max_forward_kph: f32,
    /// Top speed in R.
    pub v_max_reverse_kph: f32,
    /// Forward acceleration curve, searched in order.
    pub forward_accel_bands: Vec<AccelBand>,
    /// Forward acceleration above the last band.
    pub forward_accel_top_kph_per_s: f32,
    /// Reverse acceleration under throttle.
    pub reverse_accel_kph_per_s: f32,
    /// Minimum coast deceleration.
    pub coast_decel_base: f32,
    /// Coast deceleration per km/h of speed.
    pub coast_decel_factor: f32,
    /// Brake deceleration, any gear.
    pub brake_decel_kph_per_s: f32,

    /// Engine idle.
    pub idle_rpm: f32,
    /// Engine ceiling.
    pub rpm_max: f32,
    /// Extra target rpm while the throttle is held in D/R.
    pub rpm_blip_on_throttle: f32,
    /// Default rpm follow rate, per second.
    pub rpm_follow: f32,
    /// Free-rev ceiling in P/N.
    pub free_rev_target_rpm: f32,
    /// Free-rev rise in P/N, rpm per second.
    pub free_rev_rise_per_s: f32,
    /// Free-rev fall in P/N, rpm per second.
    pub free_rev_fall_per_s: f32,
    /// Length of the startup idle ramp, in seconds.
    pub startup_idle_ramp_s: f32,
    /// Follow rate during the startup ramp.
    pub rpm_follow_startup: f32,
    /// Follow rate while throttling in P/N.
    pub rpm_follow_pn_throttle: f32,

    /// P and R are refused above this speed.
    pub gear_lock_kph: f32,
    /// Gravity, m/s².
    pub gravity_ms2: f32,
    /// Share of gravity acting along a slope.
    pub slope_accel_factor: f32,
    /// Coasting deadband, in degrees of pitch.
    pub hill_hold_deg: f32,
    /// Scale of the slope term while coasting in D.
    pub driveline_damping: f32,
    /// Scale of the slope term under throttle in D.
    pub throttle_slope_influence: f32,
    /// Pitch below this magnitude counts as flat, in degrees.
    pub flat_pitch_deg: f32,

    /// Steering wheel travel per second under input.
    pub steer_accel: f32,
    /// Steering return to centre per second.
    pub steer_return: f32,
    /// Yaw rate at full lock, rad/s.
    pub yaw_rate_max: f32,
    /// Roll smoothing rate, per second.
    pub roll_follow: f32,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            v_max_forward_kph: 185.0,
            v_max_reverse_kph: 30.0,
            forward_accel_bands: vec![
                AccelBand {
                    below_kph: 50.0,
                    accel_kph_per_s: 10.868,
                },
                AccelBand {
                    below_kph: 90.0,
                    accel_kph_per_s: 9.090,
                },
                AccelBand {
                    below_kph: 130.0,
                    accel_kph_per_s: 8.888,
                },
            ],
            forward_accel_top_kph_per_s: 10.0,
            reverse_accel_kph_per_s: 8.0,
            coast_decel_base: 1.5,
            coast_decel_factor: 0.015,
            brake_decel_kph_per_s: 28.5,
            idle_rpm: 1700.0,
            rpm_max: 5500.0,
            rpm_blip_on_throttle: 300.0,
            rpm_follow: 6.0,
            free_rev_target_rpm: 5500.0,
            free_rev_rise_per_s: 13_500.0,
            free_rev_fall_per_s: 4000.0,
            startup_idle_ramp_s: 0.5,
            rpm_follow_startup: 12.0,
            rpm_follow_pn_throttle: 18.0,
            gear_lock_kph: 2.0,
            gravity_ms2: STANDARD_GRAVITY,
            slope_accel_factor: 0.35,
            hill_hold_deg: 1.0,
            driveline_damping: 0.85,
            throttle_slope_influence: 0.65,
            flat_pitch_deg: 0.1,
            steer_accel: 2.0,
            steer_return: 3.0,
            yaw_rate_max: 0.9,
            roll_follow: 5.0,
        }
    }
}

impl VehicleParams {
    /// Speed ceiling for the given selector position.
    pub fn v_max(&self, gear: Gear) -> f32 {
        match gear {
            Gear::Reverse => self.v_max_reverse_kph,
            _ => self.v_max_forward_kph,
        }
    }

    /// Forward acceleration at `speed_kph`, before slope corrections.
    pub fn forward_accel(&self, speed_kph: f32) -> f32 {
        self.forward_accel_bands
            .iter()
            .find(|band| speed_kph < band.below_kph)
            .map_or(self.forward_accel_top_kph_per_s, |band| band.accel_kph_per_s)
    }

    /// Checks the parameters for values the model cannot run with.
    ///
    /// Reports the first problem found.
    pub fn validate(&self) -> Result<(), VehicleParamsError> {
        let positive = [
            ("v_max_forward_kph", self.v_max_forward_kph),
            ("v_max_reverse_kph", self.v_max_reverse_kph),
            ("rpm_max", self.rpm_max),
            ("rpm_follow", self.rpm_follow),
            ("gravity_ms2", self.gravity_ms2),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(VehicleParamsError::NotPositive { name, value });
            }
        }
        if self.idle_rpm < 0.0 || self.idle_rpm >= self.rpm_max {
            return Err(VehicleParamsError::IdleOutOfRange {
                idle_rpm: self.idle_rpm,
                rpm_max: self.rpm_max,
            });
        }
        if self.gear_lock_kph < 0.0 {
            return Err(VehicleParamsError::NegativeGearLock(self.gear_lock_kph));
        }
        let ascending = self
            .forward_accel_bands
            .windows(2)
            .all(|pair| pair[0].below_kph < pair[1].below_kph);
        if !ascending {
            return Err(VehicleParamsError::UnsortedAccelBands);
        }
        Ok(())
    }
}

/// Problems found by [`VehicleParams::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VehicleParamsError {
    /// A value that must be strictly positive is not.
    #[error("`{name}` must be positive, got {value}")]
    NotPositive {
        /// Field name.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
    /// Idle sits outside `[0, rpm_max)`.
    #[error("`idle_rpm` ({idle_rpm}) must lie in [0, rpm_max ({rpm_max}))")]
    IdleOutOfRange {
        /// Configured idle.
        idle_rpm: f32,
        /// Configured redline.
        rpm_max: f32,
    },
    /// The gear lock speed is negative.
    #[error("`gear_lock_kph` must not be negative, got {0}")]
    NegativeGearLock(f32),
    /// The acceleration bands are not sorted by `below_kph`.
    #[error("`forward_accel_bands` must be sorted by `below_kph`")]
    UnsortedAccelBands,
}
