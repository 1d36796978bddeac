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

//! # Cluster Sim
//!
//! The telemetry core of the instrument cluster: a per-tick vehicle simulation,
//! the automatic gear selector, and the observers around them, all talking
//! through a [`TelemetryBus`].
//!
//! Everything here runs on the single tick thread. Shared pieces are `Rc`
//! values resolved through a [`ClusterContext`](cluster_core::ClusterContext).

#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod gear;
pub mod gearbox;
pub mod inclinometer;
pub mod kernel;
pub mod messages;
pub mod services;
pub mod speed_limit;
pub mod vehicle;

pub use bus::{BusMessage, TelemetryBus};
pub use config::{ClusterConfig, ConfigError};
pub use gear::Gear;
pub use gearbox::{AutoGearSelector, DriveGearState, ScheduleError, ShiftSchedule};
pub use inclinometer::{PitchController, PitchParams};
pub use kernel::{Cluster, ClusterControls, ClusterKernel, ClusterSnapshot};
pub use services::{AudioService, GearDisplay};
pub use speed_limit::{SpeedLimitMonitor, SpeedLimitParams};
pub use vehicle::{
    DriverInput, GearError, GearTransition, VehicleParams, VehicleParamsError, VehicleSimulation,
    VehicleState,
};
