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

//! Log-backed implementations of the capabilities the cluster consumes.

use cluster_sim::{AudioService, GearDisplay};
use std::cell::Cell;

/// Writes audio cues to the log instead of a speaker.
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioService for LogAudio {
    fn play(&self, key: &str, priority: u8) {
        log::info!("[audio] play '{key}' (priority {priority})");
    }

    fn stop(&self, key: &str) {
        log::info!("[audio] stop '{key}'");
    }
}

/// Gear indicator that logs what it would show, skipping repeats.
#[derive(Debug)]
pub struct LogGearDisplay {
    selector: Cell<char>,
    number: Cell<u8>,
}

impl Default for LogGearDisplay {
    fn default() -> Self {
        Self {
            selector: Cell::new(' '),
            number: Cell::new(0),
        }
    }
}

impl LogGearDisplay {
    /// What the indicator currently reads, e.g. `D4` or `P`.
    pub fn reading(&self) -> String {
        match self.number.get() {
            0 => self.selector.get().to_string(),
            n => format!("{}{n}", self.selector.get()),
        }
    }
}

impl GearDisplay for LogGearDisplay {
    fn set_selector(&self, selector: char) {
        if self.selector.replace(selector) != selector {
            log::info!("[display] selector {selector}");
        }
    }

    fn set_drive_gear_number(&self, gear: u8) {
        if self.number.replace(gear) != gear {
            log::debug!("[display] gear {}", self.reading());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reading() {
        let display = LogGearDisplay::default();
        display.set_selector('P');
        display.set_drive_gear_number(0);
        assert_eq!(display.reading(), "P");
        display.set_selector('D');
        display.set_drive_gear_number(3);
        assert_eq!(display.reading(), "D3");
    }
}
