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

//! Speed-limit indicator: watches road speed and flags overspeed.

use crate::bus::TelemetryBus;
use crate::messages::{SpeedChanged, SpeedLimitChanged};
use cluster_core::{ClusterContext, DirectoryError, Handler};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Highest limit the indicator can show, km/h.
pub const MAX_LIMIT_KMH: u16 = 200;

/// Configuration of the [`SpeedLimitMonitor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedLimitParams {
    /// Limit at startup, km/h.
    pub initial_kmh: u16,
    /// Limits reachable through [`SpeedLimitMonitor::select_preset`].
    pub presets_kmh: Vec<u16>,
}

impl Default for SpeedLimitParams {
    fn default() -> Self {
        Self {
            initial_kmh: 90,
            presets_kmh: vec![30, 50, 70, 90, 110, 130],
        }
    }
}

#[derive(Debug)]
struct LimitState {
    limit_kmh: Cell<u16>,
    speed_kmh: Cell<f32>,
    over_limit: Cell<bool>,
}

impl LimitState {
    /// Recomputes the overspeed flag; returns the message to publish if
    /// anything visible changed.
    fn refresh(&self, limit_changed: bool) -> Option<SpeedLimitChanged> {
        let limit_kmh = self.limit_kmh.get();
        let over_limit = self.speed_kmh.get() > f32::from(limit_kmh);
        let flag_changed = self.over_limit.replace(over_limit) != over_limit;
        (limit_changed || flag_changed).then_some(SpeedLimitChanged {
            limit_kmh,
            over_limit,
        })
    }
}

/// Observer of [`SpeedChanged`] that publishes [`SpeedLimitChanged`]
/// whenever the limit or the overspeed state changes.
pub struct SpeedLimitMonitor {
    bus: Rc<TelemetryBus>,
    params: SpeedLimitParams,
    state: Rc<LimitState>,
    on_speed: Option<Handler<SpeedChanged>>,
}

impl SpeedLimitMonitor {
    /// Creates a monitor and subscribes it to `bus`.
    pub fn new(bus: Rc<TelemetryBus>, params: SpeedLimitParams) -> Self {
        let state = Rc::new(LimitState {
            limit_kmh: Cell::new(params.initial_kmh.min(MAX_LIMIT_KMH)),
            speed_kmh: Cell::new(0.0),
            over_limit: Cell::new(false),
        });

        // The handler lives on the bus, so it only holds a weak link back.
        let weak_bus: Weak<TelemetryBus> = Rc::downgrade(&bus);
        let on_speed = {
            let state = Rc::clone(&state);
            bus.on(move |m: &SpeedChanged| {
                state.speed_kmh.set(m.kmh);
                if let (Some(msg), Some(bus)) = (state.refresh(false), weak_bus.upgrade()) {
                    bus.publish(msg);
                }
            })
        };

        Self {
            bus,
            params,
            state,
            on_speed: Some(on_speed),
        }
    }

    /// Builds a monitor on the bus registered in `ctx`.
    pub fn from_context(ctx: &ClusterContext, params: SpeedLimitParams) -> Result<Self, DirectoryError> {
        Ok(Self::new(ctx.services.resolve::<TelemetryBus>()?, params))
    }

    /// Sets the limit, clamped to `0..=200` km/h.
    pub fn set_limit(&self, kmh: i32) {
        let clamped = kmh.clamp(0, i32::from(MAX_LIMIT_KMH)) as u16;
        let changed = self.state.limit_kmh.replace(clamped) != clamped;
        if changed {
            log::debug!("Speed limit set to {clamped} km/h");
        }
        if let Some(msg) = self.state.refresh(changed) {
            self.bus.publish(msg);
        }
    }

    /// Selects preset number `index` (0-based). Returns `false` if there is
    /// no such preset.
    pub fn select_preset(&self, index: usize) -> bool {
        match self.params.presets_kmh.get(index) {
            Some(&kmh) => {
                self.set_limit(i32::from(kmh));
                true
            }
            None => false,
        }
    }

    /// Active limit, km/h.
    pub fn limit_kmh(&self) -> u16 {
        self.state.limit_kmh.get()
    }

    /// `true` while the last seen speed exceeds the limit.
    pub fn is_over_limit(&self) -> bool {
        self.state.over_limit.get()
    }

    /// Stops listening to speed updates.
    pub fn detach(&mut self) {
        if let Some(h) = self.on_speed.take() {
            self.bus.unsubscribe(&h);
        }
    }
}

impl std::fmt::Debug for SpeedLimitMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeedLimitMonitor")
            .field("state", &self.state)
            .field("attached", &self.on_speed.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for SpeedLimitMonitor {
    fn drop(&mut self) {
        self.detach();
    }
}
