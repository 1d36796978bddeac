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

//! The per-tick vehicle simulation.
//!
//! [`VehicleSimulation`] owns the authoritative [`VehicleState`]. Once per
//! tick it reads a [`DriverInput`], integrates speed, engine speed, steering
//! and body motion, and publishes the results on the [`TelemetryBus`].

mod dynamics;
mod params;

pub use self::dynamics::{
    coast_decel, integrate_speed, rpm_follow_rate, slope_accel, steer_step, target_rpm,
};
pub use self::params::{AccelBand, VehicleParams, VehicleParamsError};

use crate::bus::TelemetryBus;
use crate::gear::Gear;
use crate::messages::{
    GChanged, GearChangeRejected, GearSelectorChanged, RollChanged, RpmChanged, SpeedChanged,
};
use crate::services::AudioService;
use cluster_core::math::{self, Vec2, MS_TO_KMH};
use cluster_core::{ClusterContext, DirectoryError};
use serde::Serialize;
use std::rc::Rc;

/// Audio cue played when a selector change is refused.
pub const REJECT_CUE: &str = "error";
/// Priority of [`REJECT_CUE`].
pub const REJECT_CUE_PRIORITY: u8 = 5;

/// Lower bound for the time step of the longitudinal g finite difference.
const DT_EPSILON: f32 = 1e-4;

/// Driver controls sampled for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverInput {
    /// One-shot selector request, applied before integration.
    pub gear_request: Option<Gear>,
    /// Throttle held.
    pub throttle: bool,
    /// Brake held.
    pub brake: bool,
    /// Steering left held.
    pub steer_left: bool,
    /// Steering right held.
    pub steer_right: bool,
    /// Lets the car roll downhill in Neutral.
    pub roll_assist: bool,
    /// Road pitch in degrees, positive nose-up.
    pub pitch_deg: f32,
}

/// Snapshot of the simulated vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VehicleState {
    /// Road speed, km/h.
    pub speed_kph: f32,
    /// Engine speed.
    pub rpm: f32,
    /// Selector position.
    pub gear: Gear,
    /// Visual roll, degrees.
    pub roll_deg: f32,
    /// Acceleration in g (`x` lateral, `y` longitudinal).
    pub g: Vec2,
    /// Speed at the end of the previous tick, m/s.
    pub prev_speed_ms: f32,
}

/// Outcome of an accepted [`VehicleSimulation::set_gear`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GearTransition {
    /// The requested position was already engaged.
    Unchanged,
    /// The selector moved.
    Changed {
        /// Previous position.
        from: Gear,
        /// New position.
        to: Gear,
    },
}

/// Errors from selector requests.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GearError {
    /// P or R was requested while the vehicle was moving too fast.
    #[error("cannot engage {requested} at {speed_kph:.1} km/h (still in {current})")]
    RejectedTransition {
        /// The refused position.
        requested: Gear,
        /// The position that stays engaged.
        current: Gear,
        /// Speed at the time of the request.
        speed_kph: f32,
    },
    /// The simulation was already borrowed, typically from inside one of its
    /// own event handlers.
    #[error("vehicle simulation is busy; gear request dropped")]
    SimulationBusy,
}

/// The vehicle model.
pub struct VehicleSimulation {
    bus: Rc<TelemetryBus>,
    audio: Option<Rc<dyn AudioService>>,
    params: VehicleParams,
    state: VehicleState,
    steer: f32,
    startup_elapsed: f32,
    startup_active: bool,
}

impl VehicleSimulation {
    /// Creates a vehicle at rest in Park with the engine off.
    pub fn new(
        bus: Rc<TelemetryBus>,
        params: VehicleParams,
        audio: Option<Rc<dyn AudioService>>,
    ) -> Self {
        log::info!(
            "VehicleSimulation created (v_max {} km/h, audio {}).",
            params.v_max_forward_kph,
            if audio.is_some() { "on" } else { "off" }
        );
        Self {
            bus,
            audio,
            params,
            state: VehicleState::default(),
            steer: 0.0,
            startup_elapsed: 0.0,
            startup_active: true,
        }
    }

    /// Builds a vehicle from the capabilities registered in `ctx`.
    ///
    /// The bus is required; audio is picked up if present.
    pub fn from_context(ctx: &ClusterContext, params: VehicleParams) -> Result<Self, DirectoryError> {
        let bus = ctx.services.resolve::<TelemetryBus>()?;
        let audio = ctx.services.try_resolve::<dyn AudioService>();
        Ok(Self::new(bus, params, audio))
    }

    /// Replaces the audio service used for rejection cues.
    pub fn set_audio(&mut self, audio: Option<Rc<dyn AudioService>>) {
        self.audio = audio;
    }

    /// Moves the selector to `target`.
    ///
    /// Park and Reverse are refused above the lock speed; the refusal is
    /// logged, announced with an audio cue and published as
    /// [`GearChangeRejected`]. Engaging Park stops the vehicle.
    pub fn set_gear(&mut self, target: Gear) -> Result<GearTransition, GearError> {
        let current = self.state.gear;
        let speed_kph = self.state.speed_kph;

        if target.is_speed_locked() && speed_kph > self.params.gear_lock_kph {
            log::warn!(
                "Gear change refused: {target} requested at {speed_kph:.1} km/h (> {} km/h).",
                self.params.gear_lock_kph
            );
            if let Some(audio) = &self.audio {
                audio.play(REJECT_CUE, REJECT_CUE_PRIORITY);
            }
            self.bus.publish(GearChangeRejected {
                requested: target,
                current,
                speed_kph,
            });
            return Err(GearError::RejectedTransition {
                requested: target,
                current,
                speed_kph,
            });
        }

        if target == current {
            return Ok(GearTransition::Unchanged);
        }

        self.state.gear = target;
        if target == Gear::Park {
            self.state.speed_kph = 0.0;
        }
        log::debug!("Gear selector {current} -> {target}");
        self.bus.publish(GearSelectorChanged { gear: target });
        Ok(GearTransition::Changed {
            from: current,
            to: target,
        })
    }

    /// Advances the simulation by `dt` seconds and publishes speed, rpm, roll
    /// and g once each.
    ///
    /// A negative or non-finite `dt` leaves the state untouched and publishes
    /// nothing.
    pub fn sim_tick(&mut self, dt: f32, input: &DriverInput) {
        if !dt.is_finite() || dt < 0.0 {
            log::trace!("sim_tick skipped: invalid dt {dt}");
            return;
        }

        if let Some(request) = input.gear_request {
            // Refusals are already logged and published by `set_gear`.
            let _ = self.set_gear(request);
        }

        let p = &self.params;
        let gear = self.state.gear;

        self.state.speed_kph = integrate_speed(p, gear, self.state.speed_kph, input, dt);

        let mut target = target_rpm(
            p,
            gear,
            self.state.rpm,
            self.state.speed_kph,
            input.throttle,
            dt,
        );
        if self.startup_active {
            target = p.idle_rpm;
            self.startup_elapsed += dt;
            if self.startup_elapsed >= p.startup_idle_ramp_s {
                self.startup_active = false;
            }
        }
        let follow = rpm_follow_rate(p, gear, input.throttle, self.startup_active);
        let mut rpm = math::lerp(self.state.rpm, target, dt * follow);
        if gear.is_driven() {
            rpm = math::clamp(rpm, p.idle_rpm, p.rpm_max);
        }
        self.state.rpm = rpm;

        self.steer = steer_step(p, self.steer, input.steer_left, input.steer_right, dt);
        let yaw_rate = self.steer * p.yaw_rate_max;
        let speed_ms = self.state.speed_kph / MS_TO_KMH;
        let lateral = speed_ms * yaw_rate;
        let longitudinal = (speed_ms - self.state.prev_speed_ms) / dt.max(DT_EPSILON);
        self.state.g = Vec2::new(lateral / p.gravity_ms2, longitudinal / p.gravity_ms2);

        let target_roll = math::radians_to_degrees(self.state.g.x.atan2(1.0));
        self.state.roll_deg = math::lerp(self.state.roll_deg, target_roll, dt * p.roll_follow);

        self.bus.publish(SpeedChanged {
            kmh: self.state.speed_kph,
        });
        self.bus.publish(RpmChanged {
            rpm: self.state.rpm,
        });
        self.bus.publish(RollChanged {
            deg: self.state.roll_deg,
        });
        self.bus.publish(GChanged::from(self.state.g));

        self.state.prev_speed_ms = speed_ms;
    }

    /// Road speed in km/h.
    pub fn speed_kph(&self) -> f32 {
        self.state.speed_kph
    }

    /// Engine speed.
    pub fn rpm(&self) -> f32 {
        self.state.rpm
    }

    /// Selector position.
    pub fn gear(&self) -> Gear {
        self.state.gear
    }

    /// Visual roll in degrees.
    pub fn roll_deg(&self) -> f32 {
        self.state.roll_deg
    }

    /// Acceleration in g.
    pub fn g(&self) -> Vec2 {
        self.state.g
    }

    /// The full state.
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// The parameters the model runs with.
    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Current steering position in `[-1, 1]`.
    pub fn steer(&self) -> f32 {
        self.steer
    }

    /// `true` until the startup idle ramp has elapsed.
    pub fn is_starting_up(&self) -> bool {
        self.startup_active
    }
}

impl std::fmt::Debug for VehicleSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleSimulation")
            .field("state", &self.state)
            .field("steer", &self.steer)
            .field("startup_active", &self.startup_active)
            .field("audio", &self.audio.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingAudio {
        played: RefCell<Vec<(String, u8)>>,
    }

    impl AudioService for RecordingAudio {
        fn play(&self, key: &str, priority: u8) {
            self.played.borrow_mut().push((key.to_string(), priority));
        }
        fn stop(&self, _key: &str) {}
    }

    fn vehicle() -> (Rc<TelemetryBus>, VehicleSimulation) {
        let bus = Rc::new(TelemetryBus::new());
        let sim = VehicleSimulation::new(Rc::clone(&bus), VehicleParams::default(), None);
        (bus, sim)
    }

    fn drive_to(sim: &mut VehicleSimulation, kph: f32) {
        sim.set_gear(Gear::Drive).unwrap();
        let input = DriverInput {
            throttle: true,
            ..Default::default()
        };
        while sim.speed_kph() < kph {
            sim.sim_tick(0.05, &input);
        }
    }

    #[test]
    fn test_starts_parked_and_still() {
        let (_bus, sim) = vehicle();
        assert_eq!(sim.gear(), Gear::Park);
        assert_eq!(sim.speed_kph(), 0.0);
        assert!(sim.is_starting_up());
    }

    #[test]
    fn test_gear_change_publishes_once() {
        let (bus, mut sim) = vehicle();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            bus.on(move |m: &GearSelectorChanged| seen.borrow_mut().push(m.gear));
        }

        assert_eq!(
            sim.set_gear(Gear::Drive),
            Ok(GearTransition::Changed {
                from: Gear::Park,
                to: Gear::Drive
            })
        );
        assert_eq!(sim.set_gear(Gear::Drive), Ok(GearTransition::Unchanged));
        assert_eq!(*seen.borrow(), vec![Gear::Drive]);
    }

    #[test]
    fn test_park_refused_while_moving() {
        let (bus, mut sim) = vehicle();
        let audio = Rc::new(RecordingAudio::default());
        sim.set_audio(Some(audio.clone()));
        let rejected = Rc::new(RefCell::new(None));
        {
            let rejected = Rc::clone(&rejected);
            bus.on(move |m: &GearChangeRejected| *rejected.borrow_mut() = Some(*m));
        }

        drive_to(&mut sim, 20.0);
        let speed = sim.speed_kph();
        let err = sim.set_gear(Gear::Park).unwrap_err();

        assert!(matches!(
            err,
            GearError::RejectedTransition {
                requested: Gear::Park,
                current: Gear::Drive,
                ..
            }
        ));
        assert_eq!(sim.gear(), Gear::Drive);
        assert_eq!(sim.speed_kph(), speed);
        assert_eq!(*audio.played.borrow(), vec![("error".to_string(), 5)]);
        assert_eq!(rejected.borrow().map(|m| m.requested), Some(Gear::Park));
    }

    #[test]
    fn test_park_accepted_at_crawl_zeroes_speed() {
        let (_bus, mut sim) = vehicle();
        drive_to(&mut sim, 1.0);
        assert!(sim.speed_kph() <= 2.0);
        sim.set_gear(Gear::Park).unwrap();
        assert_eq!(sim.speed_kph(), 0.0);
    }

    #[test]
    fn test_neutral_allowed_at_speed() {
        let (_bus, mut sim) = vehicle();
        drive_to(&mut sim, 50.0);
        assert!(sim.set_gear(Gear::Neutral).is_ok());
        assert!(sim.speed_kph() > 0.0);
    }

    #[test]
    fn test_tick_publishes_each_signal_once() {
        let (bus, mut sim) = vehicle();
        let count = Rc::new(RefCell::new(0));
        {
            let c = Rc::clone(&count);
            bus.on(move |_: &SpeedChanged| *c.borrow_mut() += 1);
            let c = Rc::clone(&count);
            bus.on(move |_: &RpmChanged| *c.borrow_mut() += 1);
            let c = Rc::clone(&count);
            bus.on(move |_: &RollChanged| *c.borrow_mut() += 1);
            let c = Rc::clone(&count);
            bus.on(move |_: &GChanged| *c.borrow_mut() += 1);
        }
        sim.sim_tick(0.02, &DriverInput::default());
        assert_eq!(*count.borrow(), 4);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let (bus, mut sim) = vehicle();
        let count = Rc::new(RefCell::new(0));
        {
            let c = Rc::clone(&count);
            bus.on(move |_: &SpeedChanged| *c.borrow_mut() += 1);
        }
        let before = *sim.state();
        sim.sim_tick(f32::NAN, &DriverInput::default());
        sim.sim_tick(-0.1, &DriverInput::default());
        sim.sim_tick(f32::INFINITY, &DriverInput::default());
        assert_eq!(*sim.state(), before);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_startup_ramp_holds_idle() {
        let (_bus, mut sim) = vehicle();
        let rev = DriverInput {
            throttle: true,
            ..Default::default()
        };
        for _ in 0..5 {
            sim.sim_tick(0.05, &rev);
        }
        assert!(sim.is_starting_up());
        assert!(sim.rpm() <= 1700.0);

        for _ in 0..20 {
            sim.sim_tick(0.05, &rev);
        }
        assert!(!sim.is_starting_up());
        assert!(sim.rpm() > 1700.0);
    }

    #[test]
    fn test_steering_builds_lateral_g_and_roll() {
        let (_bus, mut sim) = vehicle();
        drive_to(&mut sim, 60.0);
        let right = DriverInput {
            throttle: true,
            steer_right: true,
            ..Default::default()
        };
        for _ in 0..20 {
            sim.sim_tick(0.05, &right);
        }
        assert!(sim.g().x > 0.0);
        assert!(sim.roll_deg() > 0.0);
        assert_relative_eq!(sim.steer(), 1.0);
    }

    #[test]
    fn test_gear_request_in_input_applies_before_integration() {
        let (_bus, mut sim) = vehicle();
        let input = DriverInput {
            gear_request: Some(Gear::Drive),
            throttle: true,
            ..Default::default()
        };
        sim.sim_tick(0.1, &input);
        assert_eq!(sim.gear(), Gear::Drive);
        assert!(sim.speed_kph() > 0.0);
    }
}
