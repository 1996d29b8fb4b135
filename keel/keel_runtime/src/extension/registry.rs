//! Extension Registry
//!
//! Records which subsystems each extension module registered, and at what
//! model version. The registry never holds a reference to a model; contexts
//! borrow the model for the duration of one extension initialization.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::{debug, info};

use keel_core::model::ManagementModel;
use keel_core::utils::ModelVersion;

use super::context::ExtensionContext;
use crate::deployment::DeployerChains;

/// Errors that can occur in extension registration
#[derive(thiserror::Error, Debug)]
pub enum ExtensionError {
    #[error("Subsystem {subsystem} already registered by module {module}")]
    DuplicateSubsystem { subsystem: String, module: String },

    #[error("Extension module {0} not found")]
    NotFound(String),
}

/// What one extension module registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionInfo {
    /// Module name
    pub module: String,

    /// Registered subsystems and their model versions
    pub subsystems: BTreeMap<String, ModelVersion>,
}

/// Transformer versions requested per subsystem.
///
/// Only the request is recorded; no transformation is performed.
#[derive(Debug, Default)]
pub struct TransformerRegistry {
    versions: RwLock<BTreeMap<String, Vec<ModelVersion>>>,
}

impl TransformerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record versions a subsystem can be transformed to.
    pub fn register(&self, subsystem: &str, versions: &[ModelVersion]) {
        let mut all = self.versions.write();
        let entry = all.entry(subsystem.to_string()).or_default();
        for version in versions {
            if !entry.contains(version) {
                entry.push(*version);
            }
        }
        entry.sort();
    }

    /// Versions recorded for a subsystem, ascending.
    pub fn versions(&self, subsystem: &str) -> Vec<ModelVersion> {
        self.versions
            .read()
            .get(subsystem)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether anything is recorded for a subsystem.
    pub fn has_transformers(&self, subsystem: &str) -> bool {
        self.versions.read().contains_key(subsystem)
    }

    /// Drop the records for a subsystem.
    pub fn remove(&self, subsystem: &str) {
        self.versions.write().remove(subsystem);
    }
}

/// Registry of extension modules.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    /// Module name to what it registered
    extensions: RwLock<HashMap<String, ExtensionInfo>>,

    /// Transformer requests
    transformers: TransformerRegistry,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context for `module` bound to `model`.
    ///
    /// Any record left by an earlier initialization of the same module is
    /// discarded first.
    pub fn extension_context<'a>(
        &'a self,
        module: &str,
        model: &'a ManagementModel,
        deployers: &'a DeployerChains,
        register_transformers: bool,
    ) -> ExtensionContext<'a> {
        self.reset(module);
        debug!(module = %module, register_transformers, "Created extension context");
        ExtensionContext::new(module, self, model, deployers, register_transformers)
    }

    fn reset(&self, module: &str) {
        let previous = self.extensions.write().insert(
            module.to_string(),
            ExtensionInfo {
                module: module.to_string(),
                subsystems: BTreeMap::new(),
            },
        );
        if let Some(previous) = previous {
            for subsystem in previous.subsystems.keys() {
                self.transformers.remove(subsystem);
            }
        }
    }

    /// Record a subsystem for `module`.
    pub(crate) fn record_subsystem(
        &self,
        module: &str,
        subsystem: &str,
        version: ModelVersion,
    ) -> Result<(), ExtensionError> {
        let mut extensions = self.extensions.write();
        if let Some(owner) = extensions
            .values()
            .find(|info| info.subsystems.contains_key(subsystem))
        {
            return Err(ExtensionError::DuplicateSubsystem {
                subsystem: subsystem.to_string(),
                module: owner.module.clone(),
            });
        }
        extensions
            .entry(module.to_string())
            .or_insert_with(|| ExtensionInfo {
                module: module.to_string(),
                subsystems: BTreeMap::new(),
            })
            .subsystems
            .insert(subsystem.to_string(), version);
        info!(module = %module, subsystem = %subsystem, version = %version, "Registered subsystem");
        Ok(())
    }

    /// Remove a module and its transformer records.
    pub fn remove_extension(&self, module: &str) -> Result<ExtensionInfo, ExtensionError> {
        let info = self
            .extensions
            .write()
            .remove(module)
            .ok_or_else(|| ExtensionError::NotFound(module.to_string()))?;
        for subsystem in info.subsystems.keys() {
            self.transformers.remove(subsystem);
        }
        info!(module = %module, "Removed extension");
        Ok(info)
    }

    /// What a module registered.
    pub fn extension(&self, module: &str) -> Option<ExtensionInfo> {
        self.extensions.read().get(module).cloned()
    }

    /// Names of all known modules, sorted.
    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<_> = self.extensions.read().keys().cloned().collect();
        modules.sort();
        modules
    }

    /// Transformer requests.
    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }
}
