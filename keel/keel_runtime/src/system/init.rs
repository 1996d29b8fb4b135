//! Initialization collaborators of the boot sequencer.
//!
//! - `ControllerInitializationHook`: startup work run once per boot on
//!   server processes
//! - `ControllerInitializer`: registers and populates the infrastructure
//!   resources every process has
//! - `AdditionalInitialization`: process-specific extra subsystems and the
//!   process type and running mode to boot with

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{debug, info};

use keel_core::model::{
    AttributeDefinition, AttributeType, CapabilityRegistry, ManagementModel, ResourceDefinition,
};
use keel_core::types::{PathAddress, PathElement, ProcessType, RunningMode};

use crate::extension::ExtensionRegistry;

/// Child type of named filesystem paths.
pub const PATH: &str = "path";
/// Child type of named network interfaces.
pub const INTERFACE: &str = "interface";

/// Startup work run during controller initialization.
pub trait ControllerInitializationHook: Send + Sync {
    /// Name used in logs and failures.
    fn name(&self) -> &str;

    /// Run the hook against the model being built.
    fn initialize(&self, process_type: ProcessType, model: &ManagementModel) -> Result<()>;
}

/// A named filesystem path, optionally relative to another path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// The path itself
    pub path: String,

    /// Name of the path this one is relative to
    pub relative_to: Option<String>,
}

/// Registers the `path=*` and `interface=*` infrastructure resources and
/// creates the configured instances.
#[derive(Debug, Clone, Default)]
pub struct ControllerInitializer {
    paths: BTreeMap<String, PathEntry>,
    interfaces: BTreeMap<String, String>,
}

impl ControllerInitializer {
    /// Create an initializer with no paths or interfaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named path.
    pub fn with_path(
        mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        relative_to: Option<&str>,
    ) -> Self {
        self.paths.insert(
            name.into(),
            PathEntry {
                path: path.into(),
                relative_to: relative_to.map(str::to_string),
            },
        );
        self
    }

    /// Add a named interface bound to `address`.
    pub fn with_interface(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.interfaces.insert(name.into(), address.into());
        self
    }

    /// Register the infrastructure definitions and create every configured
    /// instance.
    pub fn initialize_model(&self, model: &ManagementModel) -> Result<()> {
        let root = PathAddress::root();
        model
            .register_sub_model(
                &root,
                &ResourceDefinition::new(PathElement::wildcard(PATH))
                    .with_description("A named filesystem path")
                    .with_model_only_add_remove()
                    .with_attribute(AttributeDefinition::new("path", AttributeType::String).required())
                    .with_attribute(AttributeDefinition::new("relative-to", AttributeType::String)),
            )
            .context("Failed to register paths")?;
        model
            .register_sub_model(
                &root,
                &ResourceDefinition::new(PathElement::wildcard(INTERFACE))
                    .with_description("A named network interface")
                    .with_model_only_add_remove()
                    .with_attribute(
                        AttributeDefinition::new("inet-address", AttributeType::String).required(),
                    ),
            )
            .context("Failed to register interfaces")?;
        model.root_resource().ensure_child_type(PATH);
        model.root_resource().ensure_child_type(INTERFACE);

        for (name, entry) in &self.paths {
            let resource = model.add_resource(&root.append(PathElement::new(PATH, name.as_str())))?;
            resource.write_attribute("path", entry.path.clone().into());
            if let Some(relative_to) = &entry.relative_to {
                resource.write_attribute("relative-to", relative_to.clone().into());
            }
            debug!(path = %name, "Created path");
        }
        for (name, address) in &self.interfaces {
            let resource =
                model.add_resource(&root.append(PathElement::new(INTERFACE, name.as_str())))?;
            resource.write_attribute("inet-address", address.clone().into());
            debug!(interface = %name, "Created interface");
        }

        info!(
            paths = self.paths.len(),
            interfaces = self.interfaces.len(),
            "Initialized controller model"
        );
        Ok(())
    }
}

/// Process-specific settings and extra model content.
pub trait AdditionalInitialization: Send + Sync {
    /// Kind of process being booted.
    fn process_type(&self) -> ProcessType {
        ProcessType::StandaloneServer
    }

    /// Running mode to boot in.
    fn running_mode(&self) -> RunningMode {
        RunningMode::Normal
    }

    /// Register extra subsystems and resources after the controller model
    /// exists.
    fn initialize_extra_subsystems_and_model(
        &self,
        _extensions: &ExtensionRegistry,
        _model: &ManagementModel,
        _capabilities: &CapabilityRegistry,
    ) -> Result<()> {
        Ok(())
    }
}

/// `AdditionalInitialization` with fixed settings and no extra model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdditionalInitialization {
    process_type: ProcessType,
    running_mode: RunningMode,
}

impl DefaultAdditionalInitialization {
    /// Create settings for `process_type` in `running_mode`.
    pub fn new(process_type: ProcessType, running_mode: RunningMode) -> Self {
        Self {
            process_type,
            running_mode,
        }
    }
}

impl AdditionalInitialization for DefaultAdditionalInitialization {
    fn process_type(&self) -> ProcessType {
        self.process_type
    }

    fn running_mode(&self) -> RunningMode {
        self.running_mode
    }
}
