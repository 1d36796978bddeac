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

//! Telemetry recorder.
//!
//! Records are handed to a writer thread over a `flume` channel and written
//! as one JSON object per line, so the tick thread never blocks on the file.

use anyhow::{anyhow, Context, Result};
use cluster_core::Handler;
use cluster_sim::messages::{
    DriveGearChanged, GearChangeRejected, GearSelectorChanged, SpeedLimitChanged,
};
use cluster_sim::{ClusterSnapshot, TelemetryBus};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::thread::JoinHandle;

/// One line of the recording.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Full state after a tick.
    Frame(ClusterSnapshot),
    /// The selector moved.
    Selector(GearSelectorChanged),
    /// The automatic gearbox shifted.
    DriveGear(DriveGearChanged),
    /// A selector request was refused.
    GearRejected(GearChangeRejected),
    /// The speed limit or the overspeed flag changed.
    SpeedLimit(SpeedLimitChanged),
}

type SharedSender = Rc<RefCell<Option<flume::Sender<Record>>>>;

fn forward(sender: &SharedSender, record: Record) {
    if let Some(tx) = sender.borrow().as_ref() {
        if tx.send(record).is_err() {
            log::warn!("Recorder writer has stopped; dropping record.");
        }
    }
}

struct Taps {
    bus: Rc<TelemetryBus>,
    selector: Handler<GearSelectorChanged>,
    drive_gear: Handler<DriveGearChanged>,
    rejected: Handler<GearChangeRejected>,
    speed_limit: Handler<SpeedLimitChanged>,
}

impl Taps {
    fn remove(self) {
        self.bus.unsubscribe(&self.selector);
        self.bus.unsubscribe(&self.drive_gear);
        self.bus.unsubscribe(&self.rejected);
        self.bus.unsubscribe(&self.speed_limit);
    }
}

/// Writes [`Record`]s to a JSON-lines file from a background thread.
pub struct Recorder {
    sender: SharedSender,
    taps: Option<Taps>,
    writer: Option<JoinHandle<Result<u64>>>,
}

impl Recorder {
    /// Creates `path` and starts the writer thread.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create recording {}", path.display()))?;
        let (tx, rx) = flume::unbounded::<Record>();

        let writer = std::thread::Builder::new()
            .name("telemetry-recorder".to_string())
            .spawn(move || -> Result<u64> {
                let mut out = BufWriter::new(file);
                let mut written = 0u64;
                for record in rx.iter() {
                    serde_json::to_writer(&mut out, &record)?;
                    out.write_all(b"\n")?;
                    written += 1;
                }
                out.flush()?;
                Ok(written)
            })
            .context("failed to spawn recorder thread")?;

        log::info!("Recording telemetry to {}", path.display());
        Ok(Self {
            sender: Rc::new(RefCell::new(Some(tx))),
            taps: None,
            writer: Some(writer),
        })
    }

    /// Subscribes to the discrete events on `bus` so they are recorded as
    /// they happen.
    pub fn tap(&mut self, bus: &Rc<TelemetryBus>) {
        if let Some(previous) = self.taps.take() {
            previous.remove();
        }
        let selector = {
            let tx = Rc::clone(&self.sender);
            bus.on(move |m: &GearSelectorChanged| forward(&tx, Record::Selector(*m)))
        };
        let drive_gear = {
            let tx = Rc::clone(&self.sender);
            bus.on(move |m: &DriveGearChanged| forward(&tx, Record::DriveGear(*m)))
        };
        let rejected = {
            let tx = Rc::clone(&self.sender);
            bus.on(move |m: &GearChangeRejected| forward(&tx, Record::GearRejected(*m)))
        };
        let speed_limit = {
            let tx = Rc::clone(&self.sender);
            bus.on(move |m: &SpeedLimitChanged| forward(&tx, Record::SpeedLimit(*m)))
        };
        self.taps = Some(Taps {
            bus: Rc::clone(bus),
            selector,
            drive_gear,
            rejected,
            speed_limit,
        });
    }

    /// Queues a frame snapshot.
    pub fn record_frame(&self, snapshot: ClusterSnapshot) {
        forward(&self.sender, Record::Frame(snapshot));
    }

    /// Closes the channel and waits for the writer. Returns the number of
    /// records written.
    pub fn finish(mut self) -> Result<u64> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<u64> {
        if let Some(taps) = self.taps.take() {
            taps.remove();
        }
        self.sender.borrow_mut().take();
        match self.writer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("recorder thread panicked"))?,
            None => Ok(0),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Recorder shutdown failed: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_core::ClusterContext;
    use cluster_sim::{ClusterConfig, ClusterControls, ClusterKernel, Gear};

    #[test]
    fn test_records_frames_and_events() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.jsonl");

        let mut ctx = ClusterContext::new();
        let mut kernel = ClusterKernel::new(ClusterConfig::default());
        kernel.boot(&mut ctx)?;
        let cluster = kernel.cluster_mut().context("booted")?;

        let mut recorder = Recorder::create(&path)?;
        recorder.tap(cluster.bus());
        let drive = ClusterControls {
            gear_request: Some(Gear::Drive),
            ..Default::default()
        };
        let idle = ClusterControls::default();
        for i in 0..5 {
            cluster.tick(0.02, if i == 0 { &drive } else { &idle });
            recorder.record_frame(cluster.snapshot());
        }
        let bus = Rc::clone(cluster.bus());
        assert_eq!(recorder.finish()?, 6);
        assert_eq!(bus.subscriber_count::<GearSelectorChanged>(), 1);

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0]["type"], "selector");
        assert_eq!(lines[0]["gear"], "Drive");
        assert_eq!(lines[1]["type"], "frame");
        assert_eq!(lines[5]["frame"], 5);
        Ok(())
    }

    #[test]
    fn test_create_fails_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("run.jsonl");
        assert!(Recorder::create(&path).is_err());
    }
}
