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

//! Assembly of the cluster subsystems and the per-frame tick.
//!
//! The [`ClusterKernel`] wires everything through a [`ClusterContext`]: the
//! host registers its optional capabilities (audio, gear display) first,
//! then [`ClusterKernel::boot`] registers the bus and the vehicle and builds
//! the observers on top of them.

use crate::bus::TelemetryBus;
use crate::config::ClusterConfig;
use crate::gear::Gear;
use crate::gearbox::{AutoGearSelector, DriveGearState};
use crate::inclinometer::PitchController;
use crate::speed_limit::SpeedLimitMonitor;
use crate::vehicle::{DriverInput, VehicleSimulation, VehicleState};
use cluster_core::{ClusterContext, DirectoryError};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the driver can do during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClusterControls {
    /// One-shot selector request.
    pub gear_request: Option<Gear>,
    /// Throttle held.
    pub throttle: bool,
    /// Brake held.
    pub brake: bool,
    /// Steer left held.
    pub steer_left: bool,
    /// Steer right held.
    pub steer_right: bool,
    /// Pitch the road uphill.
    pub nose_up: bool,
    /// Pitch the road downhill. In Neutral this also lets the car roll.
    pub nose_down: bool,
}

/// One frame of cluster state, ready to serialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    /// Frames ticked so far.
    pub frame: u64,
    /// Simulated time, seconds.
    pub elapsed_s: f64,
    /// Vehicle state.
    pub vehicle: VehicleState,
    /// Gearbox state.
    pub drive: DriveGearState,
    /// Road pitch, degrees.
    pub pitch_deg: f32,
    /// Active speed limit, km/h.
    pub speed_limit_kmh: u16,
    /// Overspeed flag.
    pub over_limit: bool,
}

/// The running cluster.
#[derive(Debug)]
pub struct Cluster {
    bus: Rc<TelemetryBus>,
    vehicle: Rc<RefCell<VehicleSimulation>>,
    gears: AutoGearSelector,
    pitch: PitchController,
    speed_limit: SpeedLimitMonitor,
    frame: u64,
    elapsed_s: f64,
}

impl Cluster {
    /// Advances the cluster by `dt` seconds.
    ///
    /// Order: pitch source, vehicle simulation, automatic gearbox.
    pub fn tick(&mut self, dt: f32, controls: &ClusterControls) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("Cluster tick ignored: invalid dt {dt}");
            return;
        }

        let (gear, speed_kph) = {
            let vehicle = self.vehicle.borrow();
            (vehicle.gear(), vehicle.speed_kph())
        };
        let pitch_deg = self
            .pitch
            .update(dt, gear, speed_kph, controls.nose_up, controls.nose_down);

        let input = DriverInput {
            gear_request: controls.gear_request,
            throttle: controls.throttle,
            brake: controls.brake,
            steer_left: controls.steer_left,
            steer_right: controls.steer_right,
            roll_assist: controls.nose_down,
            pitch_deg,
        };
        self.vehicle.borrow_mut().sim_tick(dt, &input);
        self.gears.update();

        self.frame += 1;
        self.elapsed_s += f64::from(dt);
    }

    /// Captures the current state.
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            frame: self.frame,
            elapsed_s: self.elapsed_s,
            vehicle: *self.vehicle.borrow().state(),
            drive: self.gears.state(),
            pitch_deg: self.pitch.pitch_deg(),
            speed_limit_kmh: self.speed_limit.limit_kmh(),
            over_limit: self.speed_limit.is_over_limit(),
        }
    }

    /// The telemetry bus.
    pub fn bus(&self) -> &Rc<TelemetryBus> {
        &self.bus
    }

    /// The vehicle simulation. Do not borrow it from inside a bus handler.
    pub fn vehicle(&self) -> &Rc<RefCell<VehicleSimulation>> {
        &self.vehicle
    }

    /// The automatic gearbox.
    pub fn gears(&self) -> &AutoGearSelector {
        &self.gears
    }

    /// The pitch source.
    pub fn pitch(&self) -> &PitchController {
        &self.pitch
    }

    /// The speed-limit indicator.
    pub fn speed_limit(&self) -> &SpeedLimitMonitor {
        &self.speed_limit
    }

    /// Frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Builds and owns the [`Cluster`].
#[derive(Debug)]
pub struct ClusterKernel {
    config: ClusterConfig,
    cluster: Option<Cluster>,
}

impl ClusterKernel {
    /// Creates an unbooted kernel.
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            cluster: None,
        }
    }

    /// Registers the bus and the vehicle in `ctx` and builds the subsystems.
    ///
    /// Capabilities already registered by the host (audio, gear display) are
    /// picked up. Booting an already booted kernel does nothing.
    pub fn boot(&mut self, ctx: &mut ClusterContext) -> Result<(), DirectoryError> {
        if self.cluster.is_some() {
            log::debug!("ClusterKernel already booted.");
            return Ok(());
        }
        log::info!("Booting cluster...");

        let bus = Rc::new(TelemetryBus::new());
        ctx.services.register::<TelemetryBus>(Rc::clone(&bus))?;

        let vehicle = VehicleSimulation::from_context(ctx, self.config.vehicle.clone())?;
        let vehicle = Rc::new(RefCell::new(vehicle));
        ctx.services
            .register::<RefCell<VehicleSimulation>>(Rc::clone(&vehicle))?;

        let gears = AutoGearSelector::from_context(ctx, self.config.shift.clone())?;
        gears.sync_from_vehicle();

        let speed_limit = SpeedLimitMonitor::from_context(ctx, self.config.speed_limit.clone())?;
        let pitch = PitchController::new(self.config.pitch.clone());

        self.cluster = Some(Cluster {
            bus,
            vehicle,
            gears,
            pitch,
            speed_limit,
            frame: 0,
            elapsed_s: 0.0,
        });
        log::info!("Cluster booted ({} services registered).", ctx.services.len());
        Ok(())
    }

    /// `true` once [`boot`](Self::boot) has succeeded.
    pub fn is_booted(&self) -> bool {
        self.cluster.is_some()
    }

    /// The running cluster, if booted.
    pub fn cluster(&self) -> Option<&Cluster> {
        self.cluster.as_ref()
    }

    /// The running cluster, if booted.
    pub fn cluster_mut(&mut self) -> Option<&mut Cluster> {
        self.cluster.as_mut()
    }

    /// The configuration the kernel boots with.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Tears the cluster down, unsubscribing every observer.
    pub fn shutdown(&mut self) {
        if self.cluster.take().is_some() {
            log::info!("Cluster shut down.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SpeedChanged;
    use crate::services::{AudioService, GearDisplay};

    #[derive(Default)]
    struct Panel {
        selector: RefCell<Vec<char>>,
        cues: RefCell<Vec<String>>,
    }

    impl GearDisplay for Panel {
        fn set_selector(&self, selector: char) {
            self.selector.borrow_mut().push(selector);
        }
        fn set_drive_gear_number(&self, _gear: u8) {}
    }

    impl AudioService for Panel {
        fn play(&self, key: &str, _priority: u8) {
            self.cues.borrow_mut().push(key.to_string());
        }
        fn stop(&self, _key: &str) {}
    }

    #[test]
    fn test_boot_registers_bus_and_vehicle() {
        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).unwrap();

        assert!(kernel.is_booted());
        assert!(ctx.services.is_registered::<TelemetryBus>());
        assert!(ctx.services.is_registered::<RefCell<VehicleSimulation>>());

        let bus = ctx.services.resolve::<TelemetryBus>().unwrap();
        assert!(Rc::ptr_eq(&bus, kernel.cluster().unwrap().bus()));
    }

    #[test]
    fn test_boot_twice_is_noop() {
        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).unwrap();
        let first = ctx.services.resolve::<TelemetryBus>().unwrap();
        kernel.boot(&mut ctx).unwrap();
        let second = ctx.services.resolve::<TelemetryBus>().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.subscriber_count::<SpeedChanged>(), 2);
    }

    #[test]
    fn test_boot_uses_host_capabilities() {
        let panel = Rc::new(Panel::default());
        let mut ctx = ClusterContext::new();
        ctx.services
            .register::<dyn GearDisplay>(panel.clone() as Rc<dyn GearDisplay>)
            .unwrap();
        ctx.services
            .register::<dyn AudioService>(panel.clone() as Rc<dyn AudioService>)
            .unwrap();

        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).unwrap();
        assert!(ctx.services.is_registered::<dyn GearDisplay>());
        assert_eq!(*panel.selector.borrow(), vec!['P']);

        let cluster = kernel.cluster_mut().unwrap();
        let drive = ClusterControls {
            gear_request: Some(Gear::Drive),
            throttle: true,
            ..Default::default()
        };
        cluster.tick(0.1, &drive);
        for _ in 0..30 {
            cluster.tick(0.1, &ClusterControls { throttle: true, ..Default::default() });
        }
        cluster.tick(
            0.1,
            &ClusterControls {
                gear_request: Some(Gear::Reverse),
                ..Default::default()
            },
        );

        assert_eq!(*panel.selector.borrow(), vec!['P', 'D']);
        assert_eq!(*panel.cues.borrow(), vec!["error".to_string()]);
        assert_eq!(cluster.snapshot().vehicle.gear, Gear::Drive);
    }

    #[test]
    fn test_observer_without_bus_reports_not_found() {
        let ctx = ClusterContext::new();
        let err = AutoGearSelector::from_context(&ctx, Default::default()).unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
    }

    #[test]
    fn test_shutdown_unsubscribes_observers() {
        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).unwrap();
        let bus = ctx.services.resolve::<TelemetryBus>().unwrap();
        kernel.shutdown();
        assert!(!kernel.is_booted());
        assert_eq!(bus.subscriber_count::<SpeedChanged>(), 0);
    }

    #[test]
    fn test_tick_counts_frames_and_time() {
        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx).unwrap();
        let cluster = kernel.cluster_mut().unwrap();
        for _ in 0..10 {
            cluster.tick(0.05, &ClusterControls::default());
        }
        cluster.tick(f32::NAN, &ClusterControls::default());
        let snap = cluster.snapshot();
        assert_eq!(snap.frame, 10);
        assert!((snap.elapsed_s - 0.5).abs() < 1e-6);
        assert_eq!(snap.speed_limit_kmh, 90);
    }
}
