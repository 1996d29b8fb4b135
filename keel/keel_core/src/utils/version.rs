//! Model version utilities.
//!
//! Subsystems register their management model under a `major.minor.micro`
//! version. Transformer registrations are keyed by these versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error parsing a model version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError {
    /// The invalid version string.
    pub version: String,

    /// The reason for the error.
    pub reason: String,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid model version '{}': {}", self.version, self.reason)
    }
}

impl std::error::Error for VersionParseError {}

/// Version of a subsystem management model.
///
/// Ordered by `major`, then `minor`, then `micro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelVersion {
    /// Major version number.
    pub major: u32,

    /// Minor version number.
    pub minor: u32,

    /// Micro version number.
    pub micro: u32,
}

impl ModelVersion {
    /// Create a new version.
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for ModelVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason: &str| VersionParseError {
            version: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split('.');
        let mut next = |name: &str| -> Result<u32, VersionParseError> {
            parts
                .next()
                .ok_or_else(|| error(&format!("Missing {} version", name)))?
                .parse()
                .map_err(|_| error(&format!("Invalid {} version", name)))
        };

        let major = next("major")?;
        let minor = next("minor")?;
        // micro may be omitted
        let micro = match parts.next() {
            Some(micro) => micro.parse().map_err(|_| error("Invalid micro version"))?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(error("Too many components"));
        }

        Ok(Self::new(major, minor, micro))
    }
}

impl TryFrom<String> for ModelVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelVersion> for String {
    fn from(version: ModelVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let version = ModelVersion::from_str("1.2.3").unwrap();
        assert_eq!(version, ModelVersion::new(1, 2, 3));

        let version = ModelVersion::from_str("2.0").unwrap();
        assert_eq!(version, ModelVersion::new(2, 0, 0));

        assert!(ModelVersion::from_str("").is_err());
        assert!(ModelVersion::from_str("1").is_err());
        assert!(ModelVersion::from_str("1.x").is_err());
        assert!(ModelVersion::from_str("1.2.3.4").is_err());
    }

    #[test]
    fn test_version_ordering() {
        let v1_0 = ModelVersion::new(1, 0, 0);
        let v1_1 = ModelVersion::new(1, 1, 0);
        let v2_0 = ModelVersion::new(2, 0, 0);

        assert!(v1_0 < v1_1);
        assert!(v1_1 < v2_0);
    }

    #[test]
    fn test_version_serializes_as_string() {
        let json = serde_json::to_string(&ModelVersion::new(3, 1, 0)).unwrap();
        assert_eq!(json, "\"3.1.0\"");
        let parsed: ModelVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ModelVersion::new(3, 1, 0));
    }
}
