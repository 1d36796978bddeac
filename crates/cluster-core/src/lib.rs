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

//! # Cluster Core
//!
//! Foundational crate containing the decoupling primitives of the instrument
//! cluster: a typed synchronous [`EventBus`], an explicitly constructed
//! [`ServiceDirectory`], and the small amount of math the simulation needs.
//!
//! Nothing in here knows about vehicles. Higher-level crates define their own
//! message and capability types on top of these primitives.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod event;
pub mod math;
pub mod service_registry;

pub use context::ClusterContext;
pub use error::DirectoryError;
pub use event::{handler, EventBus, Handler};
pub use service_registry::ServiceDirectory;
