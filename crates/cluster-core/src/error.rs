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

//! Error types raised by the service directory.

use thiserror::Error;

/// An error returned by [`ServiceDirectory`](crate::ServiceDirectory) operations.
///
/// A missing core capability is a start-up configuration error, so the
/// directory fails fast instead of handing out a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Nothing is registered for the requested capability.
    #[error("no service registered for capability `{capability}`")]
    NotFound {
        /// The type name of the requested capability.
        capability: &'static str,
    },
    /// An absent instance was offered for registration.
    #[error("cannot register an absent instance for capability `{capability}`")]
    InvalidArgument {
        /// The type name of the capability being registered.
        capability: &'static str,
    },
}
