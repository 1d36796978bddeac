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

//! Provides the scalar and 2D helpers used by the cluster simulation.
//!
//! All angular functions in this module operate in **radians** unless the
//! name says otherwise (e.g. `degrees_to_radians`).

// --- Fundamental Constants ---

pub use std::f32::consts::PI;

/// The factor to convert degrees to radians (PI / 180.0).
pub const DEG_TO_RAD: f32 = PI / 180.0;
/// The factor to convert radians to degrees (180.0 / PI).
pub const RAD_TO_DEG: f32 = 180.0 / PI;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Multiply m/s by this to get km/h.
pub const MS_TO_KMH: f32 = 3.6;

// --- Declare Sub-Modules ---

pub mod vector;

// --- Re-export Principal Types ---

pub use self::vector::Vec2;

// --- Utility Functions ---

/// Converts an angle from degrees to radians.
///
/// # Examples
///
/// ```
/// use cluster_core::math::{degrees_to_radians, PI};
/// assert_eq!(degrees_to_radians(180.0), PI);
/// ```
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * DEG_TO_RAD
}

/// Converts an angle from radians to degrees.
///
/// # Examples
///
/// ```
/// use cluster_core::math::{radians_to_degrees, PI};
/// assert_eq!(radians_to_degrees(PI), 180.0);
/// ```
#[inline]
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * RAD_TO_DEG
}

/// Clamps a value to a specified minimum and maximum range.
///
/// # Examples
///
/// ```
/// use cluster_core::math::clamp;
/// assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
/// assert_eq!(clamp(-1.0, 0.0, 1.0), 0.0);
/// ```
#[inline]
pub fn clamp<T: PartialOrd>(value: T, min_val: T, max_val: T) -> T {
    if value < min_val {
        min_val
    } else if value > max_val {
        max_val
    } else {
        value
    }
}

/// Clamps a floating-point value to the `[0.0, 1.0]` range.
#[inline]
pub fn saturate(value: f32) -> f32 {
    clamp(value, 0.0, 1.0)
}

/// Interpolates from `start` to `end`; `t` is clamped to `[0.0, 1.0]`.
///
/// # Examples
///
/// ```
/// use cluster_core::math::lerp;
/// assert_eq!(lerp(1700.0, 5500.0, 0.5), 3600.0);
/// assert_eq!(lerp(0.0, 10.0, 2.0), 10.0);
/// ```
#[inline]
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * saturate(t)
}

/// Moves `current` toward `target` by at most `max_delta`, never overshooting.
///
/// # Examples
///
/// ```
/// use cluster_core::math::move_towards;
/// assert_eq!(move_towards(0.0, 1.0, 0.25), 0.25);
/// assert_eq!(move_towards(0.9, 1.0, 0.25), 1.0);
/// assert_eq!(move_towards(0.0, -1.0, 0.5), -0.5);
/// ```
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}
