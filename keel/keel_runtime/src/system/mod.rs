//! System management for the Keel runtime
//!
//! This module provides the boot sequencer, its configuration and
//! initialization collaborators, and the running mode control.

pub mod bootstrap;
pub mod config;
pub mod init;
pub mod mode;

// Re-export key types for convenience
pub use bootstrap::{BootReport, BootSequencer, BootStage};
pub use config::BootConfig;
pub use init::{
    AdditionalInitialization, ControllerInitializationHook, ControllerInitializer,
    DefaultAdditionalInitialization,
};
pub use mode::RunningModeControl;
