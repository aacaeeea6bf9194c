//! # Registry Infrastructure
//!
//! The process-wide Instance Registry that routes foreign callbacks back to
//! their managed clients.
//!
//! ## Architecture
//!
//! ```text
//! foreign thread ──▶ trampoline(handle, raw…) ──▶ instances().lookup(handle)
//!                                                     │
//!                                  None ◀─────────────┴──────────▶ Some(client)
//!                               (drop event)                   (marshal + dispatch)
//! ```
//!
//! [`InstanceRegistry`] is generic so it can be exercised on its own; the
//! crate keeps exactly one instance of it, keyed to the client state type,
//! behind [`instances`].

pub mod instance_registry;

pub use instance_registry::{InstanceRegistry, RegistryError, RegistryStats};

use crate::client::ClientInner;
use std::sync::OnceLock;

/// The only process-wide shared mutable state in the crate.
static INSTANCES: OnceLock<InstanceRegistry<ClientInner>> = OnceLock::new();

/// Global handle-to-client table used by the trampolines.
pub(crate) fn instances() -> &'static InstanceRegistry<ClientInner> {
    INSTANCES.get_or_init(InstanceRegistry::new)
}

/// Counters of the global table, for diagnostics.
pub fn global_stats() -> RegistryStats {
    instances().stats()
}
