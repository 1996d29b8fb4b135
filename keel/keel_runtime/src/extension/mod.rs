//! Extensions and their registration.
//!
//! An extension contributes subsystems to the management model. The boot
//! sequencer hands it an `ExtensionContext` bound to the model during
//! pre-boot; everything the extension registers is recorded in the
//! `ExtensionRegistry` under its module name.

pub mod context;
pub mod registry;

use anyhow::Result;

pub use context::{ExtensionContext, SubsystemRegistration};
pub use registry::{ExtensionError, ExtensionInfo, ExtensionRegistry, TransformerRegistry};

/// A pluggable module that registers subsystems into the model.
pub trait Extension: Send + Sync {
    /// Name the extension is known by in logs.
    fn name(&self) -> &str;

    /// Register the extension's subsystems through `context`.
    fn initialize(&self, context: &mut ExtensionContext<'_>) -> Result<()>;
}
