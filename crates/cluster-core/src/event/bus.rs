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

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// A shared handler for messages of type `T`.
///
/// Handlers are compared by allocation, so keep the `Rc` you subscribed with
/// if you intend to unsubscribe later.
pub type Handler<T> = Rc<dyn Fn(&T)>;

/// Wraps a closure into a [`Handler`].
///
/// Prefer this over `Rc::new` so the closure's argument type is inferred from
/// the message type.
pub fn handler<T, F>(f: F) -> Handler<T>
where
    F: Fn(&T) + 'static,
{
    Rc::new(f)
}

/// Manages a synchronous publish/subscribe channel for one message type.
///
/// The EventBus is generic over the type `T` of message it carries, which keeps
/// `cluster-core` decoupled from the concrete telemetry messages defined in
/// higher-level crates.
///
/// # Dispatch semantics
///
/// * Handlers run synchronously on the publisher's stack, in registration order.
/// * The handler list is snapshotted before dispatch: a handler may publish,
///   subscribe or unsubscribe during delivery, and the change is only seen by
///   the next publish.
/// * [`publish`](Self::publish) does not isolate handlers. A panicking handler
///   unwinds into the publisher and the remaining handlers of that call are
///   skipped. Use [`publish_isolated`](Self::publish_isolated) when one broken
///   observer must not starve the others.
pub struct EventBus<T: 'static> {
    handlers: RefCell<Vec<Handler<T>>>,
}

impl<T: 'static> EventBus<T> {
    /// Creates an EventBus with no subscribers.
    pub fn new() -> Self {
        log::trace!("EventBus<{}> initialized.", type_name::<T>());
        Self {
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Registers a handler.
    ///
    /// Registering the same handler twice is allowed and makes it run twice
    /// per publish; callers own the matching number of unsubscriptions.
    pub fn subscribe(&self, handler: Handler<T>) {
        self.handlers.borrow_mut().push(handler);
    }

    /// Removes the first registration of `handler`.
    ///
    /// ## Returns
    /// `true` if a registration was removed, `false` if the handler was not
    /// subscribed.
    pub fn unsubscribe(&self, handler: &Handler<T>) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        match handlers.iter().position(|h| Rc::ptr_eq(h, handler)) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Delivers `message` to every handler currently subscribed.
    ///
    /// Publishing with no subscribers is a no-op.
    pub fn publish(&self, message: &T) {
        let snapshot = self.snapshot();
        log::trace!(
            "Publishing {} to {} handler(s).",
            type_name::<T>(),
            snapshot.len()
        );

        for handler in snapshot {
            handler(message);
        }
    }

    /// Delivers `message` to every handler, containing handler panics.
    ///
    /// A panicking handler is logged and skipped; delivery continues with the
    /// next one.
    ///
    /// ## Returns
    /// The number of handlers that panicked.
    pub fn publish_isolated(&self, message: &T) -> usize {
        let mut faulted = 0;
        for (index, handler) in self.snapshot().into_iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                faulted += 1;
                log::error!(
                    "Handler #{index} for {} panicked; delivery continues.",
                    type_name::<T>()
                );
            }
        }
        faulted
    }

    /// Returns the number of active registrations.
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Returns `true` if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    fn snapshot(&self) -> Vec<Handler<T>> {
        self.handlers.borrow().clone()
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("message", &type_name::<T>())
            .field("handlers", &self.len())
            .finish()
    }
}
