//! Strongly-typed identifiers.
//!
//! Every boot sequence and every boot operation carries a UUID-based
//! identifier so log lines and reports can be correlated. The phantom type
//! parameter keeps identifiers of different kinds from being mixed up.
//!
//! # Examples
//!
//! ```
//! use keel_core::id::{BootId, OperationId};
//! use std::str::FromStr;
//!
//! let boot_id = BootId::new();
//! let operation_id = OperationId::new();
//! assert_ne!(boot_id.to_string(), operation_id.to_string());
//!
//! let id_str = "550e8400-e29b-41d4-a716-446655440000";
//! let operation_id = OperationId::from_str(id_str).unwrap();
//! assert_eq!(operation_id.to_string(), id_str);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe identifier based on UUID.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Create an identifier from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: PhantomData,
        }
    }
}

// Manual impls so that `T` itself needs no bounds.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for boot sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BootMarker;
/// Identifier for one boot sequence.
pub type BootId = Id<BootMarker>;

/// Marker type for boot operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationMarker;
/// Identifier for a boot or runtime operation.
pub type OperationId = Id<OperationMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_new() {
        let id1 = OperationId::new();
        let id2 = OperationId::new();
        assert_ne!(id1, id2, "Generated IDs should be unique");
    }

    #[test]
    fn test_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = BootId::from_str(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_id_serde() {
        let id = OperationId::new();
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, format!("\"{}\"", id));
        let deserialized: OperationId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);
    }
}
