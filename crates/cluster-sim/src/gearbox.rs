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

//! The automatic gearbox shown on the cluster while the selector is in Drive.
//!
//! [`ShiftSchedule`] holds the speed thresholds and decides the next gear.
//! [`AutoGearSelector`] keeps the selector letter in sync with the vehicle,
//! evaluates the schedule once per tick and announces every new gear.

use crate::bus::TelemetryBus;
use crate::gear::Gear;
use crate::messages::{DriveGearChanged, GearSelectorChanged, SpeedChanged};
use crate::services::GearDisplay;
use crate::vehicle::{GearError, GearTransition, VehicleSimulation};
use cluster_core::{ClusterContext, DirectoryError, Handler};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Number of forward gears.
pub const DRIVE_GEARS: usize = 7;

/// Speed thresholds of the automatic gearbox, in km/h.
///
/// Entry `i` of each table belongs to gear `i + 1`: above `upshift_kph[i]`
/// that gear shifts up, below `downshift_kph[i]` the gear above it shifts
/// down. The last downshift entry is a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftSchedule {
    /// Upshift thresholds.
    pub upshift_kph: [f32; DRIVE_GEARS],
    /// Downshift thresholds.
    pub downshift_kph: [f32; DRIVE_GEARS],
}

impl ShiftSchedule {
    /// The stock schedule.
    pub const PRESET: ShiftSchedule = ShiftSchedule {
        upshift_kph: [30.0, 55.0, 85.0, 115.0, 145.0, 170.0, 185.0],
        downshift_kph: [25.0, 50.0, 80.0, 110.0, 140.0, 168.0, 999.0],
    };

    /// Picks the gear for `speed_kmh` when `current` is engaged.
    ///
    /// Indices are scanned from the lowest gear up and the first threshold
    /// crossed wins. The result is at most one gear away from `current`.
    pub fn evaluate(&self, current: u8, speed_kmh: f32) -> u8 {
        let top = DRIVE_GEARS as u8;
        let current = current.clamp(1, top);
        let mut proposed = current;

        for i in 0..DRIVE_GEARS {
            let gear_at = i as u8 + 1;
            if current <= gear_at {
                if speed_kmh > self.upshift_kph[i] {
                    proposed = (gear_at + 1).min(top);
                    break;
                }
            } else if speed_kmh < self.downshift_kph[i] {
                proposed = gear_at;
                break;
            }
        }

        proposed.clamp(current.saturating_sub(1).max(1), (current + 1).min(top))
    }

    /// The gear a settled gearbox holds at `speed_kmh`, with no step limit.
    ///
    /// [`evaluate`](Self::evaluate) keeps this gear at the same speed.
    pub fn gear_for_speed(&self, speed_kmh: f32) -> u8 {
        let passed = self.upshift_kph[..DRIVE_GEARS - 1]
            .iter()
            .take_while(|&&threshold| speed_kmh > threshold)
            .count();
        passed as u8 + 1
    }

    /// Checks that the tables are finite, strictly increasing, and that
    /// every downshift sits below the matching upshift.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (table, values) in [("upshift", &self.upshift_kph), ("downshift", &self.downshift_kph)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ScheduleError::NotFinite { table, index });
            }
            if let Some(index) = values.windows(2).position(|w| w[0] >= w[1]) {
                return Err(ScheduleError::NonMonotonic {
                    table,
                    index: index + 1,
                });
            }
        }
        // The last downshift is a sentinel and may exceed the last upshift.
        for index in 0..DRIVE_GEARS - 1 {
            let (upshift, downshift) = (self.upshift_kph[index], self.downshift_kph[index]);
            if downshift >= upshift {
                return Err(ScheduleError::InvertedBand {
                    index,
                    upshift,
                    downshift,
                });
            }
        }
        Ok(())
    }
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        Self::PRESET
    }
}

/// Problems found by [`ShiftSchedule::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    /// A threshold is NaN or infinite.
    #[error("{table} threshold #{index} is not a finite number")]
    NotFinite {
        /// `"upshift"` or `"downshift"`.
        table: &'static str,
        /// Offending entry.
        index: usize,
    },
    /// A threshold does not exceed the one before it.
    #[error("{table} thresholds must increase (entry #{index})")]
    NonMonotonic {
        /// `"upshift"` or `"downshift"`.
        table: &'static str,
        /// Offending entry.
        index: usize,
    },
    /// A downshift threshold is not below its upshift threshold.
    #[error("gear {} downshift {downshift} km/h is not below upshift {upshift} km/h", .index + 1)]
    InvertedBand {
        /// Offending entry.
        index: usize,
        /// Upshift threshold.
        upshift: f32,
        /// Downshift threshold.
        downshift: f32,
    },
}

/// What the gear selector currently believes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriveGearState {
    /// Mirror of the vehicle's selector.
    pub selector: Gear,
    /// Automatic gear, 1 to 7. Only meaningful in Drive.
    pub numeric_gear: u8,
    /// Last speed seen on the bus, km/h.
    pub speed_kmh: f32,
}

impl Default for DriveGearState {
    fn default() -> Self {
        Self {
            selector: Gear::Neutral,
            numeric_gear: 1,
            speed_kmh: 0.0,
        }
    }
}

impl DriveGearState {
    /// Moves the selector to `selector`.
    ///
    /// Entering Drive picks the gear for the last known speed in one step.
    /// Returns that gear when it differs from the one held before.
    fn apply_selector(&mut self, selector: Gear, schedule: &ShiftSchedule) -> Option<u8> {
        let entering_drive = selector == Gear::Drive && self.selector != Gear::Drive;
        self.selector = selector;
        if !entering_drive {
            return None;
        }
        let seeded = schedule.gear_for_speed(self.speed_kmh);
        let previous = std::mem::replace(&mut self.numeric_gear, seeded);
        (previous != seeded).then_some(seeded)
    }

    /// The number the display should show: the gear in Drive, `0` otherwise.
    pub fn displayed_number(&self) -> u8 {
        if self.selector == Gear::Drive {
            self.numeric_gear.max(1)
        } else {
            0
        }
    }
}

fn push_to_display(display: Option<&Rc<dyn GearDisplay>>, state: &DriveGearState) {
    if let Some(display) = display {
        display.set_selector(state.selector.as_char());
        display.set_drive_gear_number(state.displayed_number());
    }
}

/// Observes the vehicle through the bus and runs the automatic gearbox.
///
/// The selector subscribes to [`SpeedChanged`] and [`GearSelectorChanged`]
/// on construction and unsubscribes on [`detach`](Self::detach) or drop.
pub struct AutoGearSelector {
    bus: Rc<TelemetryBus>,
    vehicle: Option<Rc<RefCell<VehicleSimulation>>>,
    display: Option<Rc<dyn GearDisplay>>,
    schedule: ShiftSchedule,
    state: Rc<RefCell<DriveGearState>>,
    on_speed: Option<Handler<SpeedChanged>>,
    on_selector: Option<Handler<GearSelectorChanged>>,
}

impl AutoGearSelector {
    /// Creates a selector and subscribes it to `bus`.
    pub fn new(
        bus: Rc<TelemetryBus>,
        schedule: ShiftSchedule,
        vehicle: Option<Rc<RefCell<VehicleSimulation>>>,
        display: Option<Rc<dyn GearDisplay>>,
    ) -> Self {
        let state = Rc::new(RefCell::new(DriveGearState::default()));

        let on_speed = {
            let state = Rc::clone(&state);
            bus.on(move |m: &SpeedChanged| state.borrow_mut().speed_kmh = m.kmh)
        };
        let on_selector = {
            let state = Rc::clone(&state);
            let display = display.clone();
            let schedule = schedule.clone();
            let weak_bus = Rc::downgrade(&bus);
            bus.on(move |m: &GearSelectorChanged| {
                let (snapshot, seeded) = {
                    let mut s = state.borrow_mut();
                    let seeded = s.apply_selector(m.gear, &schedule);
                    (*s, seeded)
                };
                push_to_display(display.as_ref(), &snapshot);
                if let (Some(numeric_gear), Some(bus)) = (seeded, weak_bus.upgrade()) {
                    log::debug!("Drive engaged in gear {numeric_gear} at {:.1} km/h", snapshot.speed_kmh);
                    bus.publish(DriveGearChanged { numeric_gear });
                }
            })
        };

        log::info!(
            "AutoGearSelector created (vehicle {}, display {}).",
            if vehicle.is_some() { "attached" } else { "none" },
            if display.is_some() { "attached" } else { "none" }
        );

        Self {
            bus,
            vehicle,
            display,
            schedule,
            state,
            on_speed: Some(on_speed),
            on_selector: Some(on_selector),
        }
    }

    /// Builds a selector from the capabilities registered in `ctx`.
    ///
    /// The bus is required. The vehicle and the display are optional.
    pub fn from_context(ctx: &ClusterContext, schedule: ShiftSchedule) -> Result<Self, DirectoryError> {
        let bus = ctx.services.resolve::<TelemetryBus>()?;
        let vehicle = ctx.services.try_resolve::<RefCell<VehicleSimulation>>();
        let display = ctx.services.try_resolve::<dyn GearDisplay>();
        Ok(Self::new(bus, schedule, vehicle, display))
    }

    /// Copies the vehicle's selector position and refreshes the display.
    pub fn sync_from_vehicle(&self) {
        let Some(vehicle) = &self.vehicle else {
            return;
        };
        let Ok(vehicle) = vehicle.try_borrow() else {
            log::warn!("AutoGearSelector: vehicle busy, selector not synced.");
            return;
        };
        let snapshot = {
            let mut s = self.state.borrow_mut();
            s.apply_selector(vehicle.gear(), &self.schedule);
            *s
        };
        push_to_display(self.display.as_ref(), &snapshot);
    }

    /// Asks for a new selector position.
    ///
    /// With a vehicle attached the request goes through its transition rules
    /// and may be refused. Without one the selector changes locally and the
    /// change is published as [`GearSelectorChanged`], which the selector
    /// itself mirrors like any other selector event.
    pub fn request_gear(&self, target: Gear) -> Result<GearTransition, GearError> {
        if let Some(vehicle) = &self.vehicle {
            let mut vehicle = vehicle
                .try_borrow_mut()
                .map_err(|_| GearError::SimulationBusy)?;
            return vehicle.set_gear(target);
        }

        let from = self.state.borrow().selector;
        if from == target {
            return Ok(GearTransition::Unchanged);
        }
        self.bus.publish(GearSelectorChanged { gear: target });
        Ok(GearTransition::Changed { from, to: target })
    }

    /// Runs one evaluation of the shift schedule.
    ///
    /// Returns the new gear if it changed. Outside Drive nothing happens.
    pub fn update(&self) -> Option<u8> {
        let DriveGearState {
            selector,
            numeric_gear,
            speed_kmh,
        } = *self.state.borrow();
        if selector != Gear::Drive {
            return None;
        }

        let next = self.schedule.evaluate(numeric_gear, speed_kmh);
        if next == numeric_gear {
            return None;
        }

        self.state.borrow_mut().numeric_gear = next;
        log::debug!("Drive gear {numeric_gear} -> {next} at {speed_kmh:.1} km/h");
        self.bus.publish(DriveGearChanged { numeric_gear: next });
        if let Some(display) = &self.display {
            display.set_drive_gear_number(next);
        }
        Some(next)
    }

    /// Unsubscribes from the bus. Further events are ignored.
    pub fn detach(&mut self) {
        if let Some(h) = self.on_speed.take() {
            self.bus.unsubscribe(&h);
        }
        if let Some(h) = self.on_selector.take() {
            self.bus.unsubscribe(&h);
        }
    }

    /// Current view of the gearbox.
    pub fn state(&self) -> DriveGearState {
        *self.state.borrow()
    }

    /// Selector letter currently shown.
    pub fn selector(&self) -> Gear {
        self.state.borrow().selector
    }

    /// Current automatic gear.
    pub fn numeric_gear(&self) -> u8 {
        self.state.borrow().numeric_gear
    }

    /// The thresholds in use.
    pub fn schedule(&self) -> &ShiftSchedule {
        &self.schedule
    }
}

impl Drop for AutoGearSelector {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for AutoGearSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoGearSelector")
            .field("state", &*self.state.borrow())
            .field("attached", &self.on_speed.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleParams;

    #[derive(Default)]
    struct RecordingDisplay {
        calls: RefCell<Vec<String>>,
    }

    impl GearDisplay for RecordingDisplay {
        fn set_selector(&self, selector: char) {
            self.calls.borrow_mut().push(selector.to_string());
        }
        fn set_drive_gear_number(&self, gear: u8) {
            self.calls.borrow_mut().push(gear.to_string());
        }
    }

    #[test]
    fn test_evaluate_preset_thresholds() {
        let s = ShiftSchedule::PRESET;
        assert_eq!(s.evaluate(1, 30.0), 1);
        assert_eq!(s.evaluate(1, 30.1), 2);
        assert_eq!(s.evaluate(2, 26.0), 2);
        assert_eq!(s.evaluate(2, 24.9), 1);
        assert_eq!(s.evaluate(6, 171.0), 7);
        assert_eq!(s.evaluate(7, 200.0), 7);
        assert_eq!(s.evaluate(7, 169.0), 7);
        assert_eq!(s.evaluate(7, 167.0), 6);
    }

    #[test]
    fn test_evaluate_moves_one_step() {
        let s = ShiftSchedule::PRESET;
        assert_eq!(s.evaluate(5, 10.0), 4);
        assert_eq!(s.evaluate(1, 150.0), 2);
        assert_eq!(s.evaluate(0, 0.0), 1);
    }

    #[test]
    fn test_gear_for_speed_is_a_resting_point_of_evaluate() {
        let s = ShiftSchedule::PRESET;
        assert_eq!(s.gear_for_speed(0.0), 1);
        assert_eq!(s.gear_for_speed(30.0), 1);
        assert_eq!(s.gear_for_speed(30.1), 2);
        assert_eq!(s.gear_for_speed(120.0), 5);
        assert_eq!(s.gear_for_speed(250.0), 7);
        assert_eq!(s.gear_for_speed(f32::NAN), 1);

        let mut speed = 0.0;
        while speed <= 200.0 {
            let gear = s.gear_for_speed(speed);
            assert_eq!(s.evaluate(gear, speed), gear, "at {speed} km/h");
            speed += 0.25;
        }
    }

    #[test]
    fn test_no_oscillation_at_constant_speed() {
        let s = ShiftSchedule::PRESET;
        let mut speed = 0.0;
        while speed <= 190.0 {
            for start in 1..=7u8 {
                let mut gear = start;
                let mut history = vec![gear];
                for _ in 0..20 {
                    gear = s.evaluate(gear, speed);
                    history.push(gear);
                }
                let rising = history.windows(2).all(|w| w[1] >= w[0]);
                let falling = history.windows(2).all(|w| w[1] <= w[0]);
                assert!(rising || falling, "oscillation at {speed} km/h: {history:?}");
            }
            speed += 0.5;
        }
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        assert!(ShiftSchedule::PRESET.validate().is_ok());

        let mut s = ShiftSchedule::PRESET;
        s.upshift_kph[3] = 50.0;
        assert_eq!(
            s.validate(),
            Err(ScheduleError::NonMonotonic {
                table: "upshift",
                index: 3
            })
        );

        let mut s = ShiftSchedule::PRESET;
        s.downshift_kph[0] = 30.0;
        assert!(matches!(s.validate(), Err(ScheduleError::InvertedBand { index: 0, .. })));

        let mut s = ShiftSchedule::PRESET;
        s.downshift_kph[2] = f32::NAN;
        assert!(matches!(s.validate(), Err(ScheduleError::NotFinite { .. })));
    }

    #[test]
    fn test_selector_mirrors_vehicle_and_updates_display() {
        let bus = Rc::new(TelemetryBus::new());
        let vehicle = Rc::new(RefCell::new(VehicleSimulation::new(
            Rc::clone(&bus),
            VehicleParams::default(),
            None,
        )));
        let display = Rc::new(RecordingDisplay::default());
        let selector = AutoGearSelector::new(
            Rc::clone(&bus),
            ShiftSchedule::PRESET,
            Some(Rc::clone(&vehicle)),
            Some(display.clone()),
        );

        selector.sync_from_vehicle();
        assert_eq!(selector.selector(), Gear::Park);

        selector.request_gear(Gear::Drive).unwrap();
        assert_eq!(selector.selector(), Gear::Drive);
        assert_eq!(vehicle.borrow().gear(), Gear::Drive);
        assert_eq!(*display.calls.borrow(), ["P", "0", "D", "1"]);
    }

    #[test]
    fn test_update_announces_new_gear() {
        let bus = Rc::new(TelemetryBus::new());
        let selector = AutoGearSelector::new(Rc::clone(&bus), ShiftSchedule::PRESET, None, None);
        let announced = Rc::new(RefCell::new(Vec::new()));
        {
            let announced = Rc::clone(&announced);
            bus.on(move |m: &DriveGearChanged| announced.borrow_mut().push(m.numeric_gear));
        }

        bus.publish(SpeedChanged { kmh: 40.0 });
        assert_eq!(selector.update(), None, "not in Drive yet");

        selector.request_gear(Gear::Drive).unwrap();
        assert_eq!(selector.numeric_gear(), 2, "seeded from the current speed");
        assert_eq!(selector.update(), None);

        bus.publish(SpeedChanged { kmh: 10.0 });
        assert_eq!(selector.update(), Some(1));
        assert_eq!(*announced.borrow(), vec![2, 1]);
    }

    #[test]
    fn test_reengaging_drive_settles_in_one_step() {
        let bus = Rc::new(TelemetryBus::new());
        let display = Rc::new(RecordingDisplay::default());
        let selector =
            AutoGearSelector::new(Rc::clone(&bus), ShiftSchedule::PRESET, None, Some(display.clone()));
        let announced = Rc::new(RefCell::new(Vec::new()));
        {
            let announced = Rc::clone(&announced);
            bus.on(move |m: &DriveGearChanged| announced.borrow_mut().push(m.numeric_gear));
        }

        bus.publish(SpeedChanged { kmh: 130.0 });
        selector.request_gear(Gear::Drive).unwrap();
        assert_eq!(selector.numeric_gear(), 5);

        selector.request_gear(Gear::Neutral).unwrap();
        bus.publish(SpeedChanged { kmh: 0.0 });
        assert_eq!(selector.update(), None);
        assert_eq!(selector.numeric_gear(), 5, "held while out of Drive");

        display.calls.borrow_mut().clear();
        selector.request_gear(Gear::Drive).unwrap();
        assert_eq!(selector.numeric_gear(), 1);
        assert_eq!(selector.update(), None);
        assert_eq!(*announced.borrow(), vec![5, 1]);
        assert_eq!(*display.calls.borrow(), ["D", "1"]);
    }

    #[test]
    fn test_local_fallback_publishes_selector_change() {
        let bus = Rc::new(TelemetryBus::new());
        let selector = AutoGearSelector::new(Rc::clone(&bus), ShiftSchedule::PRESET, None, None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            bus.on(move |m: &GearSelectorChanged| seen.borrow_mut().push(m.gear));
        }

        assert_eq!(
            selector.request_gear(Gear::Reverse),
            Ok(GearTransition::Changed {
                from: Gear::Neutral,
                to: Gear::Reverse
            })
        );
        assert_eq!(selector.request_gear(Gear::Reverse), Ok(GearTransition::Unchanged));
        assert_eq!(*seen.borrow(), vec![Gear::Reverse]);
    }

    #[test]
    fn test_request_while_vehicle_borrowed_is_busy() {
        let bus = Rc::new(TelemetryBus::new());
        let vehicle = Rc::new(RefCell::new(VehicleSimulation::new(
            Rc::clone(&bus),
            VehicleParams::default(),
            None,
        )));
        let selector = AutoGearSelector::new(
            Rc::clone(&bus),
            ShiftSchedule::PRESET,
            Some(Rc::clone(&vehicle)),
            None,
        );
        let _held = vehicle.borrow_mut();
        assert_eq!(selector.request_gear(Gear::Drive), Err(GearError::SimulationBusy));
    }

    #[test]
    fn test_detach_and_drop_unsubscribe() {
        let bus = Rc::new(TelemetryBus::new());
        let mut selector = AutoGearSelector::new(Rc::clone(&bus), ShiftSchedule::PRESET, None, None);
        assert_eq!(bus.subscriber_count::<SpeedChanged>(), 1);
        selector.detach();
        assert_eq!(bus.subscriber_count::<SpeedChanged>(), 0);
        assert_eq!(bus.subscriber_count::<GearSelectorChanged>(), 0);

        let selector = AutoGearSelector::new(Rc::clone(&bus), ShiftSchedule::PRESET, None, None);
        assert_eq!(bus.subscriber_count::<GearSelectorChanged>(), 1);
        drop(selector);
        assert_eq!(bus.subscriber_count::<GearSelectorChanged>(), 0);
    }
}
