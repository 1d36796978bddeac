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

//! The gear-selector position.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of the P/R/N/D selector.
///
/// This is the selector lever, not the numeric gear chosen by the automatic
/// gearbox while in [`Gear::Drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gear {
    /// Transmission locked, vehicle held at rest.
    #[default]
    Park,
    /// Reverse.
    Reverse,
    /// Neutral, no drive to the wheels.
    Neutral,
    /// Forward drive with automatic gear selection.
    Drive,
}

impl Gear {
    /// All selector positions in lever order.
    pub const ALL: [Gear; 4] = [Gear::Park, Gear::Reverse, Gear::Neutral, Gear::Drive];

    /// The single-letter label shown on the cluster.
    pub const fn as_char(self) -> char {
        match self {
            Gear::Park => 'P',
            Gear::Reverse => 'R',
            Gear::Neutral => 'N',
            Gear::Drive => 'D',
        }
    }

    /// Parses a selector label, case-insensitively.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'P' => Some(Gear::Park),
            'R' => Some(Gear::Reverse),
            'N' => Some(Gear::Neutral),
            'D' => Some(Gear::Drive),
            _ => None,
        }
    }

    /// `true` for positions that may not be engaged while rolling.
    pub const fn is_speed_locked(self) -> bool {
        matches!(self, Gear::Park | Gear::Reverse)
    }

    /// `true` when the engine is coupled to the wheels.
    pub const fn is_driven(self) -> bool {
        matches!(self, Gear::Drive | Gear::Reverse)
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error returned when parsing an unknown selector label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gear selector `{0}` (expected one of P, R, N, D)")]
pub struct ParseGearError(pub String);

impl FromStr for Gear {
    type Err = ParseGearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Gear::from_char(c),
            _ => match trimmed.to_ascii_lowercase().as_str() {
                "park" => Some(Gear::Park),
                "reverse" => Some(Gear::Reverse),
                "neutral" => Some(Gear::Neutral),
                "drive" => Some(Gear::Drive),
                _ => None,
            },
        }
        .ok_or_else(|| ParseGearError(s.to_string()))
    }
}
