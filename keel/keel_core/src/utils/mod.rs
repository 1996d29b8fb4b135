//! Utility types: log levels and model versions.

pub mod logging;
pub mod version;

pub use logging::LogLevel;
pub use version::{ModelVersion, VersionParseError};
