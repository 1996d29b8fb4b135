//! Boot configuration
//!
//! Handles loading and validating the configuration a process boots with.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use keel_core::types::{BootOperation, PathAddress, ProcessType, RunningMode};
use keel_core::utils::LogLevel;

use super::init::ControllerInitializer;
use crate::controller::ValidationFilter;

/// Errors that can occur in configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A named filesystem path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// The path itself
    pub path: String,

    /// Name of the path this one is relative to
    #[serde(default, rename = "relative-to")]
    pub relative_to: Option<String>,
}

/// Operations excluded from pre-boot validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Address pattern; `*` names match anything
    pub address: PathAddress,

    /// Operation name; every operation when absent
    #[serde(default)]
    pub operation: Option<String>,
}

/// Boot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootConfig {
    /// Module name the extension registers under
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Kind of process
    #[serde(default)]
    pub process_type: ProcessType,

    /// Running mode to boot in
    #[serde(default)]
    pub running_mode: RunningMode,

    /// Whether extensions record transformer versions
    #[serde(default)]
    pub register_transformers: bool,

    /// Whether a failing boot operation rolls back the whole boot batch
    #[serde(default = "default_rollback_on_failure")]
    pub rollback_on_failure: bool,

    /// Directory of the filesystem content repository; content is kept in
    /// memory when absent
    #[serde(default)]
    pub content_directory: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Named filesystem paths
    #[serde(default)]
    pub paths: BTreeMap<String, PathConfig>,

    /// Named interfaces and their addresses
    #[serde(default)]
    pub interfaces: BTreeMap<String, String>,

    /// Operations excluded from validation
    #[serde(default)]
    pub validation_exclusions: Vec<ExclusionConfig>,

    /// Boot operations, replayed in order
    #[serde(default)]
    pub operations: Vec<BootOperation>,
}

fn default_module_name() -> String {
    "main".to_string()
}

fn default_rollback_on_failure() -> bool {
    true
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            module_name: default_module_name(),
            process_type: ProcessType::default(),
            running_mode: RunningMode::default(),
            register_transformers: false,
            rollback_on_failure: default_rollback_on_failure(),
            content_directory: None,
            log_level: LogLevel::default(),
            paths: BTreeMap::new(),
            interfaces: BTreeMap::new(),
            validation_exclusions: Vec::new(),
            operations: Vec::new(),
        }
    }
}

impl BootConfig {
    /// Load configuration from a file
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let mut config = BootConfig::default();

        if let Some(path) = path {
            info!("Loading configuration from {}", path);

            if !Path::new(path).exists() {
                warn!("Configuration file not found: {}", path);
                return Ok(config);
            }

            let content = fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path, e)))?;

            config = serde_json::from_str(&content)
                .context(format!("Failed to parse configuration file: {}", path))?;
        } else {
            info!("No configuration file specified, using defaults");
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.module_name.trim().is_empty() {
            return Err(ConfigError::Invalid("Module name cannot be empty".to_string()).into());
        }

        if let Some(directory) = &self.content_directory {
            if directory.trim().is_empty() {
                return Err(
                    ConfigError::Invalid("Content directory cannot be empty".to_string()).into(),
                );
            }
        }

        for (name, entry) in &self.paths {
            if let Some(relative_to) = &entry.relative_to {
                if !self.paths.contains_key(relative_to) {
                    return Err(ConfigError::Invalid(format!(
                        "Path {} is relative to unknown path {}",
                        name, relative_to
                    ))
                    .into());
                }
            }
        }

        for operation in &self.operations {
            if operation.address.is_wildcard() {
                return Err(ConfigError::Invalid(format!(
                    "Boot operation {} targets wildcard address {}",
                    operation.name, operation.address
                ))
                .into());
            }
        }

        if !self.process_type.is_server() && !self.operations.is_empty() {
            warn!(
                process_type = %self.process_type,
                "Boot operations configured for a non-server process"
            );
        }

        Ok(())
    }

    /// Merge with another configuration
    pub fn merge(&mut self, other: BootConfig) {
        if !other.module_name.is_empty() {
            self.module_name = other.module_name;
        }

        self.process_type = other.process_type;
        self.running_mode = other.running_mode;
        self.register_transformers |= other.register_transformers;
        self.rollback_on_failure = other.rollback_on_failure;
        self.log_level = other.log_level;

        if other.content_directory.is_some() {
            self.content_directory = other.content_directory;
        }

        self.paths.extend(other.paths);
        self.interfaces.extend(other.interfaces);
        self.validation_exclusions
            .extend(other.validation_exclusions);
        self.operations.extend(other.operations);
    }

    /// Controller initializer for the configured paths and interfaces
    pub fn controller_initializer(&self) -> ControllerInitializer {
        let initializer = self
            .paths
            .iter()
            .fold(ControllerInitializer::new(), |initializer, (name, entry)| {
                initializer.with_path(name.as_str(), entry.path.as_str(), entry.relative_to.as_deref())
            });
        self.interfaces
            .iter()
            .fold(initializer, |initializer, (name, address)| {
                initializer.with_interface(name.as_str(), address.as_str())
            })
    }

    /// Validation filter for the configured exclusions
    pub fn validation_filter(&self) -> ValidationFilter {
        self.validation_exclusions
            .iter()
            .fold(ValidationFilter::new(), |filter, exclusion| {
                filter.exclude(exclusion.address.clone(), exclusion.operation.as_deref())
            })
    }
}
