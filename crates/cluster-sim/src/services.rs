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

//! Capabilities the cluster consumes through the
//! [`ServiceDirectory`](cluster_core::ServiceDirectory).
//!
//! Both are optional. Subsystems look them up with `try_resolve` and carry on
//! silently when the host did not register one.

/// Plays short audio cues.
pub trait AudioService {
    /// Starts the cue named `key`. Higher `priority` wins over lower ones.
    fn play(&self, key: &str, priority: u8);
    /// Stops the cue named `key` if it is playing.
    fn stop(&self, key: &str);
}

/// The gear indicator on the cluster face.
pub trait GearDisplay {
    /// Shows the selector letter (`P`, `R`, `N` or `D`).
    fn set_selector(&self, selector: char);
    /// Shows the automatic gear number; `0` blanks it.
    fn set_drive_gear_number(&self, gear: u8);
}
