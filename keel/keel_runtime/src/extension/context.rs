//! What an extension sees while it initializes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use keel_core::model::{ManagementModel, ManagementResourceRegistration, ResourceDefinition};
use keel_core::types::{PathAddress, PathElement};
use keel_core::utils::ModelVersion;

use super::registry::ExtensionRegistry;
use crate::deployment::{DeployerChains, Phase};

/// Child type under which subsystems are registered.
pub const SUBSYSTEM: &str = "subsystem";

/// Context handed to `Extension::initialize`, bound to one model.
pub struct ExtensionContext<'a> {
    module: String,
    registry: &'a ExtensionRegistry,
    model: &'a ManagementModel,
    deployers: &'a DeployerChains,
    register_transformers: bool,
}

impl<'a> ExtensionContext<'a> {
    pub(crate) fn new(
        module: &str,
        registry: &'a ExtensionRegistry,
        model: &'a ManagementModel,
        deployers: &'a DeployerChains,
        register_transformers: bool,
    ) -> Self {
        Self {
            module: module.to_string(),
            registry,
            model,
            deployers,
            register_transformers,
        }
    }

    /// Module name the registrations are recorded under.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// Root of the registration tree.
    pub fn root_registration(&self) -> &Arc<ManagementResourceRegistration> {
        self.model.root_registration()
    }

    /// The model being built.
    pub fn model(&self) -> &ManagementModel {
        self.model
    }

    /// Whether transformer versions should be recorded.
    pub fn is_register_transformers(&self) -> bool {
        self.register_transformers
    }

    /// Claim a subsystem name for this module.
    pub fn register_subsystem(
        &self,
        name: &str,
        version: ModelVersion,
    ) -> Result<SubsystemRegistration<'_>> {
        self.registry
            .record_subsystem(&self.module, name, version)
            .with_context(|| format!("Failed to register subsystem {}", name))?;
        Ok(SubsystemRegistration {
            name: name.to_string(),
            version,
            context: self,
        })
    }

    /// Register a deployment processor for `phase`.
    pub fn register_deployment_processor(
        &self,
        subsystem: &str,
        phase: Phase,
        priority: u32,
        processor: &str,
    ) {
        self.deployers.add(subsystem, phase, priority, processor);
    }
}

/// Handle for one subsystem claimed through `ExtensionContext`.
pub struct SubsystemRegistration<'c> {
    name: String,
    version: ModelVersion,
    context: &'c ExtensionContext<'c>,
}

impl<'c> SubsystemRegistration<'c> {
    /// Subsystem name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model version the subsystem was registered at.
    pub fn version(&self) -> ModelVersion {
        self.version
    }

    /// Register the subsystem's root definition at `subsystem=<name>`.
    ///
    /// The definition's own path is replaced. The empty subsystem resource
    /// is created along with the registration.
    pub fn register_subsystem_model(
        &self,
        definition: ResourceDefinition,
    ) -> Result<Arc<ManagementResourceRegistration>> {
        let definition = ResourceDefinition {
            path: PathElement::new(SUBSYSTEM, self.name.as_str()),
            ..definition
        };
        let registration = self
            .context
            .model
            .register_sub_model(&PathAddress::root(), &definition)
            .with_context(|| format!("Failed to register model of subsystem {}", self.name))?;
        debug!(subsystem = %self.name, "Registered subsystem model");
        Ok(registration)
    }

    /// Record transformer versions; ignored unless the context requests
    /// transformers. Returns whether anything was recorded.
    pub fn register_transformers(&self, versions: &[ModelVersion]) -> bool {
        if !self.context.register_transformers {
            return false;
        }
        self.context
            .registry
            .transformers()
            .register(&self.name, versions);
        true
    }
}
