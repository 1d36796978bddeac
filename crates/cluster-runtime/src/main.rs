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

//! Headless instrument-cluster runtime.
//!
//! Boots the cluster, drives it through a scripted scenario at a fixed tick
//! rate, optionally records telemetry, and prints a JSON summary.

mod recorder;
mod scenario;
mod services;
mod sim_loop;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use cluster_core::ClusterContext;
use cluster_sim::{AudioService, ClusterConfig, ClusterKernel, GearDisplay};
use recorder::Recorder;
use scenario::{Scenario, ScenarioPlayer};
use services::{LogAudio, LogGearDisplay};
use sim_loop::LoopSettings;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "cluster-runtime", version, about)]
struct Cli {
    /// Cluster configuration (TOML). Stock values are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preset name (full-throttle, downhill-coast, city) or a scenario TOML file.
    #[arg(long, default_value = "full-throttle")]
    scenario: String,

    /// Stop after this many simulated seconds.
    #[arg(long)]
    duration: Option<f32>,

    /// Simulation ticks per second.
    #[arg(long, default_value_t = 60)]
    hz: u32,

    /// Write a JSON-lines telemetry recording to this file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Log a status line every N frames (0 to disable).
    #[arg(long, default_value_t = 30)]
    log_every: u64,

    /// Initial speed limit in km/h, overriding the configuration.
    #[arg(long)]
    speed_limit: Option<i32>,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    ensure!(cli.hz > 0, "--hz must be at least 1");
    if let Some(duration) = cli.duration {
        ensure!(
            duration.is_finite() && duration > 0.0,
            "--duration must be a positive number of seconds"
        );
    }

    let config = match &cli.config {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    let scenario = Scenario::resolve(&cli.scenario)?;

    let mut ctx = ClusterContext::new();
    let display = Rc::new(LogGearDisplay::default());
    ctx.services
        .register::<dyn AudioService>(Rc::new(LogAudio) as Rc<dyn AudioService>)?;
    ctx.services
        .register::<dyn GearDisplay>(display.clone() as Rc<dyn GearDisplay>)?;

    let mut kernel = ClusterKernel::new(config);
    kernel.boot(&mut ctx).context("failed to boot the cluster")?;
    let cluster = kernel
        .cluster_mut()
        .context("cluster missing after boot")?;

    if let Some(limit) = cli.speed_limit {
        cluster.speed_limit().set_limit(limit);
    }

    let mut recorder = cli.record.as_deref().map(Recorder::create).transpose()?;
    if let Some(recorder) = recorder.as_mut() {
        recorder.tap(cluster.bus());
    }

    let settings = LoopSettings {
        hz: cli.hz,
        max_duration_s: cli.duration,
        log_every: cli.log_every,
    };
    let mut player = ScenarioPlayer::new(scenario);
    let summary = sim_loop::run(cluster, &mut player, &settings, recorder.as_ref());

    if let Some(recorder) = recorder {
        let written = recorder.finish()?;
        log::info!("Recorder wrote {written} records.");
    }
    log::info!("Gear display reads {}", display.reading());
    kernel.shutdown();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
