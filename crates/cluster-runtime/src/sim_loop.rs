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

//! Fixed-step loop driving the cluster from a scenario.

use crate::recorder::Recorder;
use crate::scenario::ScenarioPlayer;
use cluster_sim::{Cluster, ClusterSnapshot};
use serde::Serialize;

/// How the loop runs.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Ticks per simulated second.
    pub hz: u32,
    /// Optional cap on simulated time, seconds.
    pub max_duration_s: Option<f32>,
    /// Log a status line every this many frames; `0` disables it.
    pub log_every: u64,
}

impl LoopSettings {
    pub fn dt(&self) -> f32 {
        1.0 / self.hz.max(1) as f32
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub frames: u64,
    pub elapsed_s: f64,
    pub max_speed_kph: f32,
    pub max_rpm: f32,
    pub shifts: u32,
    #[serde(rename = "final")]
    pub last: ClusterSnapshot,
}

/// Runs until the scenario ends or the duration cap is reached.
pub fn run(
    cluster: &mut Cluster,
    player: &mut ScenarioPlayer,
    settings: &LoopSettings,
    recorder: Option<&Recorder>,
) -> RunSummary {
    let dt = settings.dt();
    let max_frames = settings
        .max_duration_s
        .map(|s| (f64::from(s) * f64::from(settings.hz)).round() as u64);

    let mut frames = 0u64;
    let mut max_speed_kph = 0.0f32;
    let mut max_rpm = 0.0f32;
    let mut shifts = 0u32;
    let mut last_gear = cluster.gears().numeric_gear();

    log::info!(
        "Running scenario '{}' at {} Hz ({:.1} s scripted).",
        player.scenario().name,
        settings.hz,
        player.scenario().duration_s()
    );

    while max_frames.map_or(true, |limit| frames < limit) {
        let Some(controls) = player.next_controls(dt) else {
            break;
        };
        cluster.tick(dt, &controls);
        frames += 1;

        let snapshot = cluster.snapshot();
        max_speed_kph = max_speed_kph.max(snapshot.vehicle.speed_kph);
        max_rpm = max_rpm.max(snapshot.vehicle.rpm);
        if snapshot.drive.numeric_gear != last_gear {
            shifts += 1;
            last_gear = snapshot.drive.numeric_gear;
        }
        if let Some(recorder) = recorder {
            recorder.record_frame(snapshot);
        }
        if settings.log_every > 0 && frames % settings.log_every == 0 {
            log::info!(
                "t={:6.2}s  {}{}  {:6.1} km/h  {:5.0} rpm  pitch {:+5.1}°  g ({:+.2}, {:+.2})",
                snapshot.elapsed_s,
                snapshot.drive.selector,
                snapshot.drive.displayed_number(),
                snapshot.vehicle.speed_kph,
                snapshot.vehicle.rpm,
                snapshot.pitch_deg,
                snapshot.vehicle.g.x,
                snapshot.vehicle.g.y,
            );
        }
    }

    let last = cluster.snapshot();
    log::info!(
        "Scenario '{}' done: {frames} frames, {:.1} s, top speed {max_speed_kph:.1} km/h.",
        player.scenario().name,
        last.elapsed_s
    );
    RunSummary {
        scenario: player.scenario().name.clone(),
        frames,
        elapsed_s: last.elapsed_s,
        max_speed_kph,
        max_rpm,
        shifts,
        last,
    }
}
