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

//! Pure per-tick integration steps of the vehicle model.
//!
//! Each function takes the current value and returns the next one. The
//! [`VehicleSimulation`](super::VehicleSimulation) chains them in order and
//! owns the state in between.

use super::params::VehicleParams;
use super::DriverInput;
use crate::gear::Gear;
use cluster_core::math::{self, MS_TO_KMH};

/// Acceleration along a slope of `deg` degrees, in km/h per second.
pub fn slope_accel(params: &VehicleParams, deg: f32) -> f32 {
    params.slope_accel_factor
        * params.gravity_ms2
        * math::degrees_to_radians(deg).sin()
        * MS_TO_KMH
}

/// Coast deceleration at `speed_kph`, in km/h per second.
pub fn coast_decel(params: &VehicleParams, speed_kph: f32) -> f32 {
    params
        .coast_decel_base
        .max(params.coast_decel_factor * speed_kph)
}

/// Advances the speed by one tick and clamps it to the gear's range.
pub fn integrate_speed(
    params: &VehicleParams,
    gear: Gear,
    speed_kph: f32,
    input: &DriverInput,
    dt: f32,
) -> f32 {
    let coast = coast_decel(params, speed_kph);
    let pitch = input.pitch_deg;
    let mut v = speed_kph;

    match gear {
        Gear::Drive if input.throttle => {
            let mut accel = params.forward_accel(v);
            if pitch.abs() > params.flat_pitch_deg {
                let slope = slope_accel(params, pitch.abs());
                let signed = if pitch > 0.0 { -slope } else { slope };
                accel += signed * params.throttle_slope_influence;
            }
            v += accel * dt;
        }
        Gear::Drive => {
            v = (v - coast * dt).max(0.0);
            if !input.brake {
                let downhill = (-pitch).max(0.0);
                if downhill > params.flat_pitch_deg {
                    let effective = (downhill - params.hill_hold_deg).max(0.0);
                    if effective > 0.0 {
                        v += slope_accel(params, effective) * params.driveline_damping * dt;
                    }
                }
                let uphill = pitch.max(0.0);
                if uphill > params.flat_pitch_deg {
                    let effective = (uphill - params.hill_hold_deg).max(0.0);
                    if effective > 0.0 {
                        let extra = slope_accel(params, effective) * params.driveline_damping * dt;
                        v = (v - extra).max(0.0);
                    }
                }
            }
        }
        Gear::Reverse => {
            if input.throttle {
                v += params.reverse_accel_kph_per_s * dt;
            } else {
                v = (v - coast * dt).max(0.0);
            }
        }
        Gear::Park | Gear::Neutral => {
            v = (v - coast * dt).max(0.0);
            let downhill = (-pitch).max(0.0);
            if gear == Gear::Neutral && input.roll_assist && downhill > params.flat_pitch_deg {
                v += slope_accel(params, downhill) * dt;
            }
        }
    }

    if input.brake {
        v -= params.brake_decel_kph_per_s * dt;
    }
    math::clamp(v, 0.0, params.v_max(gear))
}

/// The rpm the engine is heading for this tick, ignoring the startup ramp.
///
/// In D and R the target follows road speed; in P and N the engine free-revs,
/// so the target itself moves from the current `rpm`.
pub fn target_rpm(
    params: &VehicleParams,
    gear: Gear,
    rpm: f32,
    speed_kph: f32,
    throttle: bool,
    dt: f32,
) -> f32 {
    if gear.is_driven() {
        let t = math::saturate(speed_kph / params.v_max(gear));
        let mut target = math::lerp(params.idle_rpm, params.rpm_max, t);
        if throttle {
            target += params.rpm_blip_on_throttle;
        }
        math::clamp(target, params.idle_rpm, params.rpm_max)
    } else if throttle {
        math::move_towards(rpm, params.free_rev_target_rpm, params.free_rev_rise_per_s * dt)
    } else {
        math::move_towards(rpm, params.idle_rpm, params.free_rev_fall_per_s * dt)
    }
}

/// Follow rate of the actual rpm toward its target, per second.
pub fn rpm_follow_rate(params: &VehicleParams, gear: Gear, throttle: bool, startup: bool) -> f32 {
    let mut follow = params.rpm_follow;
    if startup {
        follow = follow.max(params.rpm_follow_startup);
    }
    if !gear.is_driven() && throttle {
        follow = follow.max(params.rpm_follow_pn_throttle);
    }
    follow
}

/// Moves the steering position toward full lock or back to centre.
pub fn steer_step(params: &VehicleParams, steer: f32, left: bool, right: bool, dt: f32) -> f32 {
    if left {
        math::move_towards(steer, -1.0, params.steer_accel * dt)
    } else if right {
        math::move_towards(steer, 1.0, params.steer_accel * dt)
    } else {
        math::move_towards(steer, 0.0, params.steer_return * dt)
    }
}
