//! Keel Runtime - boot sequencing and runtime services for the Keel
//! management controller
//!
//! This crate provides the boot sequencer and the collaborators it drives:
//! extensions and their registry, content repositories, the deployment
//! resource and deployer chains, and the model controller that executes
//! management operations once boot completes.

pub mod content;
pub mod controller;
pub mod deployment;
pub mod extension;
pub mod persistence;
pub mod system;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use keel_core::traits::ContentRepository;
use keel_core::types::ModelValue;

use content::{FileSystemContentRepository, InMemoryContentRepository};
use controller::{ModelController, OperationValidator};
use extension::{Extension, ExtensionRegistry};
use persistence::InMemoryConfigurationPersister;
use system::{
    BootConfig, BootReport, BootSequencer, ControllerInitializationHook,
    DefaultAdditionalInitialization,
};

/// Runtime facade that assembles a boot sequencer from a configuration.
pub struct Runtime {
    /// Configuration the runtime was built from
    pub config: BootConfig,

    /// Extension registry shared with the sequencer
    pub extensions: Arc<ExtensionRegistry>,

    /// Persister holding the boot operations and the stored model
    pub persister: Arc<InMemoryConfigurationPersister>,

    /// Boot sequencer
    sequencer: BootSequencer,
}

impl Runtime {
    /// Create a new Runtime instance
    pub async fn new(config_path: Option<&str>, extension: Arc<dyn Extension>) -> Result<Self> {
        let config = BootConfig::load(config_path).await?;
        Self::from_config(config, extension)
    }

    /// Create a Runtime from an already loaded configuration
    pub fn from_config(config: BootConfig, extension: Arc<dyn Extension>) -> Result<Self> {
        info!(module = %config.module_name, "Initializing Keel Runtime");
        config.validate()?;

        let content: Arc<dyn ContentRepository> = match &config.content_directory {
            Some(directory) => Arc::new(
                FileSystemContentRepository::new(directory)
                    .with_context(|| format!("Failed to open content directory {}", directory))?,
            ),
            None => Arc::new(InMemoryContentRepository::new()),
        };

        let extensions = Arc::new(ExtensionRegistry::new());
        let persister = Arc::new(InMemoryConfigurationPersister::new(config.operations.clone()));
        let sequencer = BootSequencer::create(
            extension,
            config.controller_initializer(),
            Arc::new(DefaultAdditionalInitialization::new(
                config.process_type,
                config.running_mode,
            )),
            extensions.clone(),
            persister.clone(),
            Some(OperationValidator::with_filter(config.validation_filter())),
            config.register_transformers,
        )
        .with_content_repository(content)
        .with_module_name(config.module_name.as_str())
        .with_rollback_on_failure(config.rollback_on_failure);

        info!("Keel Runtime initialized successfully");

        Ok(Self {
            config,
            extensions,
            persister,
            sequencer,
        })
    }

    /// Set the initialization hooks, in the order they run
    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn ControllerInitializationHook>>) -> Self {
        self.sequencer = self.sequencer.with_hooks(hooks);
        self
    }

    /// Boot the runtime
    pub fn boot(&mut self) -> Result<BootReport> {
        info!("Booting Keel Runtime");
        let report = self.sequencer.boot()?;
        info!(boot_id = %report.boot_id, "Keel Runtime booted successfully");
        Ok(report)
    }

    /// The model controller, once booted
    pub fn controller(&self) -> Result<Arc<ModelController>> {
        self.sequencer.controller()
    }

    /// The boot sequencer
    pub fn sequencer(&self) -> &BootSequencer {
        &self.sequencer
    }

    /// The content repository deployments reference
    pub fn content_repository(&self) -> &Arc<dyn ContentRepository> {
        self.sequencer.content_repository()
    }

    /// The model stored at the end of boot
    pub fn stored_model(&self) -> Option<ModelValue> {
        self.persister.stored_model()
    }
}
