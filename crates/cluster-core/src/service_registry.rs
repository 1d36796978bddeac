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

//! A type-safe service directory for cluster subsystems.
//!
//! The [`ServiceDirectory`] maps a capability, usually a trait object such as
//! `dyn AudioService`, to one shared implementation. Subsystems fetch only the
//! capabilities they need, and adding a new capability never modifies the
//! [`ClusterContext`](crate::ClusterContext).
//!
//! # Design
//!
//! This follows the **Service Locator** pattern, but the directory is an
//! ordinary value owned by a context rather than a process-wide static.

use crate::error::DirectoryError;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

struct Entry {
    capability: &'static str,
    // Always an `Rc<T>` for the `T` whose `TypeId` keys the entry.
    instance: Box<dyn Any>,
}

/// A service directory keyed by the capability's [`TypeId`].
///
/// Implementations are stored as `Rc<T>`, where `T` may be unsized, and are
/// retrieved by the same capability type.
///
/// # Example
///
/// ```rust
/// use cluster_core::service_registry::ServiceDirectory;
/// use std::rc::Rc;
///
/// trait Clock { fn now(&self) -> f32; }
/// struct Fixed;
/// impl Clock for Fixed { fn now(&self) -> f32 { 4.0 } }
///
/// let mut directory = ServiceDirectory::new();
/// let clock: Rc<dyn Clock> = Rc::new(Fixed);
/// directory.register::<dyn Clock>(clock).unwrap();
///
/// let clock = directory.resolve::<dyn Clock>().unwrap();
/// assert_eq!(clock.now(), 4.0);
/// ```
#[derive(Default)]
pub struct ServiceDirectory {
    services: HashMap<TypeId, Entry>,
}

impl ServiceDirectory {
    /// Creates an empty service directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers `instance` as the implementation of capability `T`.
    ///
    /// Any previous registration for `T` is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidArgument`] if `instance` is `None`.
    pub fn register<T: ?Sized + 'static>(
        &mut self,
        instance: impl Into<Option<Rc<T>>>,
    ) -> Result<(), DirectoryError> {
        let capability = type_name::<T>();
        let instance = instance
            .into()
            .ok_or(DirectoryError::InvalidArgument { capability })?;

        let previous = self.services.insert(
            TypeId::of::<T>(),
            Entry {
                capability,
                instance: Box::new(instance),
            },
        );
        if previous.is_some() {
            log::debug!("ServiceDirectory: replaced {capability}");
        } else {
            log::debug!("ServiceDirectory: registered {capability}");
        }
        Ok(())
    }

    /// Retrieves the implementation registered for capability `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if nothing is registered for `T`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Rc<T>, DirectoryError> {
        self.try_resolve::<T>().ok_or(DirectoryError::NotFound {
            capability: type_name::<T>(),
        })
    }

    /// Retrieves the implementation registered for `T`, or `None` on a miss.
    #[must_use]
    pub fn try_resolve<T: ?Sized + 'static>(&self) -> Option<Rc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.instance.downcast_ref::<Rc<T>>())
            .cloned()
    }

    /// Returns `true` if a service is registered for `T`.
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Removes the registration for `T`.
    ///
    /// Returns `true` if something was removed.
    pub fn unregister<T: ?Sized + 'static>(&mut self) -> bool {
        let removed = self.services.remove(&TypeId::of::<T>()).is_some();
        if removed {
            log::debug!("ServiceDirectory: unregistered {}", type_name::<T>());
        }
        removed
    }

    /// Clears every registration.
    pub fn reset(&mut self) {
        if !self.services.is_empty() {
            log::debug!("ServiceDirectory: reset ({} entries)", self.services.len());
        }
        self.services.clear();
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.values().map(|e| e.capability).collect();
        names.sort_unstable();
        f.debug_struct("ServiceDirectory")
            .field("capabilities", &names)
            .finish()
    }
}
