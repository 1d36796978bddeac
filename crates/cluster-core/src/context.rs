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

//! Core cluster context providing access to shared capabilities.

use crate::service_registry::ServiceDirectory;

/// Context object handed to every subsystem at construction time.
///
/// It replaces a process-wide registry: whoever boots the cluster owns the
/// context, and tests simply build a fresh one instead of resetting globals.
#[derive(Debug, Default)]
pub struct ClusterContext {
    /// Capability lookup shared by the subsystems built from this context.
    pub services: ServiceDirectory,
}

impl ClusterContext {
    /// Creates a context with an empty service directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: ServiceDirectory::new(),
        }
    }

    /// Drops every registration, bounding the lifetime of the services to a
    /// single boot.
    pub fn reset(&mut self) {
        self.services.reset();
    }
}
