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

//! Scripted driving scenarios.
//!
//! A scenario is a list of segments, each holding a fixed set of controls for
//! a number of seconds. A segment's `gear` is requested once, on its first
//! frame. Scenarios are written in TOML:
//!
//! ```toml
//! name = "launch"
//!
//! [[segment]]
//! duration_s = 10.0
//! gear = "Drive"
//! throttle = true
//! ```

use anyhow::{bail, ensure, Context, Result};
use cluster_sim::{ClusterControls, Gear};
use serde::Deserialize;
use std::path::Path;

const FULL_THROTTLE: &str = r#"
name = "full-throttle"

[[segment]]
duration_s = 25.0
gear = "Drive"
throttle = true
"#;

const DOWNHILL_COAST: &str = r#"
name = "downhill-coast"

[[segment]]
duration_s = 8.0
gear = "Drive"
throttle = true

[[segment]]
duration_s = 15.0
nose_down = true
"#;

const CITY: &str = r#"
name = "city"

[[segment]]
duration_s = 6.0
gear = "Drive"
throttle = true

[[segment]]
duration_s = 3.0

[[segment]]
duration_s = 4.0
throttle = true
steer_left = true

[[segment]]
duration_s = 1.5
brake = true

[[segment]]
duration_s = 3.0
throttle = true
steer_right = true

[[segment]]
duration_s = 4.0
brake = true
gear = "Park"

[[segment]]
duration_s = 1.0
gear = "Park"
"#;

/// Names accepted by [`Scenario::resolve`] without a file.
pub const PRESETS: [&str; 3] = ["full-throttle", "downhill-coast", "city"];

/// One stretch of constant controls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Segment {
    /// How long the controls are held, seconds.
    pub duration_s: f32,
    /// Selector request issued on the segment's first frame.
    #[serde(default)]
    pub gear: Option<Gear>,
    #[serde(default)]
    pub throttle: bool,
    #[serde(default)]
    pub brake: bool,
    #[serde(default)]
    pub steer_left: bool,
    #[serde(default)]
    pub steer_right: bool,
    #[serde(default)]
    pub nose_up: bool,
    #[serde(default)]
    pub nose_down: bool,
}

impl Segment {
    fn held_controls(&self) -> ClusterControls {
        ClusterControls {
            gear_request: None,
            throttle: self.throttle,
            brake: self.brake,
            steer_left: self.steer_left,
            steer_right: self.steer_right,
            nose_up: self.nose_up,
            nose_down: self.nose_down,
        }
    }
}

/// A named list of segments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(rename = "segment")]
    pub segments: Vec<Segment>,
}

impl Scenario {
    /// Parses and checks a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(text).context("malformed scenario")?;
        ensure!(
            !scenario.segments.is_empty(),
            "scenario '{}' has no segments",
            scenario.name
        );
        for (i, segment) in scenario.segments.iter().enumerate() {
            ensure!(
                segment.duration_s.is_finite() && segment.duration_s > 0.0,
                "segment #{i} of '{}' has a non-positive duration",
                scenario.name
            );
        }
        Ok(scenario)
    }

    /// Returns the built-in scenario called `name`.
    pub fn preset(name: &str) -> Result<Self> {
        let text = match name {
            "full-throttle" => FULL_THROTTLE,
            "downhill-coast" => DOWNHILL_COAST,
            "city" => CITY,
            other => bail!("unknown scenario preset '{other}' (available: {})", PRESETS.join(", ")),
        };
        Self::from_toml_str(text)
    }

    /// Resolves a preset name, or else reads `name_or_path` as a TOML file.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if PRESETS.contains(&name_or_path) {
            return Self::preset(name_or_path);
        }
        let path = Path::new(name_or_path);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in scenario file {}", path.display()))
    }

    /// Total length in seconds.
    pub fn duration_s(&self) -> f32 {
        self.segments.iter().map(|s| s.duration_s).sum()
    }
}

/// Plays a [`Scenario`] frame by frame.
#[derive(Debug)]
pub struct ScenarioPlayer {
    scenario: Scenario,
    index: usize,
    segment_elapsed: f32,
    gear_sent: bool,
}

impl ScenarioPlayer {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            index: 0,
            segment_elapsed: 0.0,
            gear_sent: false,
        }
    }

    /// Controls for the next frame of length `dt`, or `None` once the
    /// scenario is over.
    pub fn next_controls(&mut self, dt: f32) -> Option<ClusterControls> {
        loop {
            let segment = self.scenario.segments.get(self.index)?;
            if self.segment_elapsed >= segment.duration_s {
                self.index += 1;
                self.segment_elapsed = 0.0;
                self.gear_sent = false;
                log::debug!("Scenario '{}': segment #{}", self.scenario.name, self.index);
                continue;
            }

            let mut controls = segment.held_controls();
            if !self.gear_sent {
                controls.gear_request = segment.gear;
                self.gear_sent = true;
            }
            self.segment_elapsed += dt;
            return Some(controls);
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// `true` once every segment has been played.
    pub fn is_finished(&self) -> bool {
        self.index >= self.scenario.segments.len()
    }
}
