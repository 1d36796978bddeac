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

//! The cluster's telemetry bus: one typed channel per message kind.
//!
//! The set of message kinds is closed. Each kind owns a dedicated
//! [`EventBus`], and the [`BusMessage`] trait routes a message type to its
//! channel at compile time, so `subscribe::<SpeedChanged>` and
//! `publish(SpeedChanged { .. })` never look anything up at runtime.

use crate::messages::{
    DriveGearChanged, GChanged, GearChangeRejected, GearSelectorChanged, RollChanged, RpmChanged,
    SpeedChanged, SpeedLimitChanged,
};
use cluster_core::event::{handler, EventBus, Handler};

/// A message kind that has a channel on the [`TelemetryBus`].
pub trait BusMessage: Sized + 'static {
    /// Returns the channel carrying this message kind.
    fn channel(bus: &TelemetryBus) -> &EventBus<Self>;
}

/// Synchronous fan-out of cluster telemetry to any number of observers.
///
/// Delivery order, re-entrancy and fault semantics are those of
/// [`EventBus`]: registration order, snapshot before dispatch, and a
/// panicking handler aborts the rest of that publish unless
/// [`publish_isolated`](Self::publish_isolated) is used.
#[derive(Debug, Default)]
pub struct TelemetryBus {
    speed: EventBus<SpeedChanged>,
    rpm: EventBus<RpmChanged>,
    roll: EventBus<RollChanged>,
    g: EventBus<GChanged>,
    gear_selector: EventBus<GearSelectorChanged>,
    drive_gear: EventBus<DriveGearChanged>,
    gear_rejected: EventBus<GearChangeRejected>,
    speed_limit: EventBus<SpeedLimitChanged>,
}

macro_rules! route_messages {
    ($($message:ty => $field:ident),* $(,)?) => {
        $(
            impl BusMessage for $message {
                fn channel(bus: &TelemetryBus) -> &EventBus<Self> {
                    &bus.$field
                }
            }
        )*

        impl TelemetryBus {
            /// Drops every subscription on every channel.
            pub fn clear(&self) {
                $(self.$field.clear();)*
            }
        }
    };
}

route_messages! {
    SpeedChanged => speed,
    RpmChanged => rpm,
    RollChanged => roll,
    GChanged => g,
    GearSelectorChanged => gear_selector,
    DriveGearChanged => drive_gear,
    GearChangeRejected => gear_rejected,
    SpeedLimitChanged => speed_limit,
}

impl TelemetryBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        log::info!("TelemetryBus initialized.");
        Self::default()
    }

    /// Registers `handler` for messages of kind `M`.
    pub fn subscribe<M: BusMessage>(&self, handler: Handler<M>) {
        M::channel(self).subscribe(handler);
    }

    /// Wraps `f` into a handler, subscribes it, and returns it so the caller
    /// can unsubscribe later.
    pub fn on<M, F>(&self, f: F) -> Handler<M>
    where
        M: BusMessage,
        F: Fn(&M) + 'static,
    {
        let h = handler(f);
        self.subscribe(h.clone());
        h
    }

    /// Removes the first registration of `handler` for kind `M`.
    pub fn unsubscribe<M: BusMessage>(&self, handler: &Handler<M>) -> bool {
        M::channel(self).unsubscribe(handler)
    }

    /// Delivers `message` to every subscriber of its kind.
    pub fn publish<M: BusMessage>(&self, message: M) {
        M::channel(self).publish(&message);
    }

    /// Delivers `message`, containing handler panics.
    ///
    /// Returns the number of handlers that panicked.
    pub fn publish_isolated<M: BusMessage>(&self, message: M) -> usize {
        M::channel(self).publish_isolated(&message)
    }

    /// Number of registrations for kind `M`.
    pub fn subscriber_count<M: BusMessage>(&self) -> usize {
        M::channel(self).len()
    }
}
