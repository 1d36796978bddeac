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

//! Wiring of the booted cluster: pitch feeding the vehicle, observers on the
//! shared bus, and the context handed over by the host.

use cluster_core::ClusterContext;
use cluster_sim::messages::{GearSelectorChanged, RpmChanged, SpeedLimitChanged};
use cluster_sim::{
    AudioService, ClusterConfig, ClusterControls, ClusterKernel, Gear, GearDisplay, TelemetryBus,
    VehicleSimulation,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct HostPanel {
    log: RefCell<Vec<String>>,
}

impl GearDisplay for HostPanel {
    fn set_selector(&self, selector: char) {
        self.log.borrow_mut().push(format!("selector {selector}"));
    }
    fn set_drive_gear_number(&self, gear: u8) {
        self.log.borrow_mut().push(format!("gear {gear}"));
    }
}

impl AudioService for HostPanel {
    fn play(&self, key: &str, priority: u8) {
        self.log.borrow_mut().push(format!("play {key}/{priority}"));
    }
    fn stop(&self, key: &str) {
        self.log.borrow_mut().push(format!("stop {key}"));
    }
}

fn booted_with_panel() -> anyhow::Result<(ClusterContext, ClusterKernel, Rc<HostPanel>)> {
    let panel = Rc::new(HostPanel::default());
    let mut ctx = ClusterContext::new();
    ctx.services
        .register::<dyn GearDisplay>(panel.clone() as Rc<dyn GearDisplay>)?;
    ctx.services
        .register::<dyn AudioService>(panel.clone() as Rc<dyn AudioService>)?;
    let mut kernel = ClusterKernel::new(ClusterConfig::default());
    kernel.boot(&mut ctx)?;
    Ok((ctx, kernel, panel))
}

#[test]
fn test_vehicle_is_resolvable_from_context() -> anyhow::Result<()> {
    let (ctx, kernel, _panel) = booted_with_panel()?;
    let vehicle = ctx.services.resolve::<RefCell<VehicleSimulation>>()?;
    let cluster = kernel.cluster().expect("booted");
    assert!(Rc::ptr_eq(&vehicle, cluster.vehicle()));
    assert_eq!(vehicle.borrow().gear(), Gear::Park);
    Ok(())
}

#[test]
fn test_display_follows_selector_and_gear() -> anyhow::Result<()> {
    let (_ctx, mut kernel, panel) = booted_with_panel()?;
    let cluster = kernel.cluster_mut().expect("booted");

    let mut controls = ClusterControls {
        gear_request: Some(Gear::Drive),
        throttle: true,
        ..Default::default()
    };
    while cluster.gears().numeric_gear() < 2 {
        cluster.tick(0.02, &controls);
        controls.gear_request = None;
    }

    assert_eq!(
        *panel.log.borrow(),
        vec!["selector P", "gear 0", "selector D", "gear 1", "gear 2"]
    );
    Ok(())
}

#[test]
fn test_nose_down_in_neutral_rolls_the_car() -> anyhow::Result<()> {
    let (_ctx, mut kernel, _panel) = booted_with_panel()?;
    let cluster = kernel.cluster_mut().expect("booted");

    cluster.tick(
        0.02,
        &ClusterControls {
            gear_request: Some(Gear::Neutral),
            ..Default::default()
        },
    );
    let roll = ClusterControls {
        nose_down: true,
        ..Default::default()
    };
    for _ in 0..250 {
        cluster.tick(0.02, &roll);
    }

    let snap = cluster.snapshot();
    assert!(snap.pitch_deg < -20.0, "pitch {}", snap.pitch_deg);
    assert!(snap.vehicle.speed_kph > 5.0, "speed {}", snap.vehicle.speed_kph);
    assert_eq!(snap.vehicle.gear, Gear::Neutral);
    Ok(())
}

#[test]
fn test_rejected_request_plays_cue_and_keeps_gear() -> anyhow::Result<()> {
    let (ctx, mut kernel, panel) = booted_with_panel()?;
    let bus = ctx.services.resolve::<TelemetryBus>()?;
    let selector_events = Rc::new(RefCell::new(0));
    {
        let selector_events = Rc::clone(&selector_events);
        bus.on(move |_: &GearSelectorChanged| *selector_events.borrow_mut() += 1);
    }

    let cluster = kernel.cluster_mut().expect("booted");
    let mut controls = ClusterControls {
        gear_request: Some(Gear::Drive),
        throttle: true,
        ..Default::default()
    };
    for _ in 0..100 {
        cluster.tick(0.02, &controls);
        controls.gear_request = None;
    }
    cluster.tick(
        0.02,
        &ClusterControls {
            gear_request: Some(Gear::Park),
            ..Default::default()
        },
    );

    assert_eq!(cluster.gears().selector(), Gear::Drive);
    assert_eq!(*selector_events.borrow(), 1);
    assert!(panel.log.borrow().iter().any(|l| l == "play error/5"));
    Ok(())
}

#[test]
fn test_observers_share_one_bus() -> anyhow::Result<()> {
    let (ctx, mut kernel, _panel) = booted_with_panel()?;
    let bus = ctx.services.resolve::<TelemetryBus>()?;
    let rpm_seen = Rc::new(RefCell::new(Vec::new()));
    let limits = Rc::new(RefCell::new(Vec::new()));
    {
        let rpm_seen = Rc::clone(&rpm_seen);
        bus.on(move |m: &RpmChanged| rpm_seen.borrow_mut().push(m.rpm));
        let limits = Rc::clone(&limits);
        bus.on(move |m: &SpeedLimitChanged| limits.borrow_mut().push(*m));
    }

    let cluster = kernel.cluster_mut().expect("booted");
    cluster.speed_limit().select_preset(0);
    for _ in 0..10 {
        cluster.tick(0.02, &ClusterControls::default());
    }

    assert_eq!(rpm_seen.borrow().len(), 10);
    assert_eq!(limits.borrow().len(), 1);
    assert_eq!(limits.borrow()[0].limit_kmh, 30);
    Ok(())
}
