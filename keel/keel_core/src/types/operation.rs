//! Management operations.
//!
//! Operations are the only way the resource tree changes after the schema
//! is registered. A boot operation is the recorded form replayed at startup;
//! the same type is used for operations executed after boot.

use serde::{Deserialize, Serialize};

use crate::id::OperationId;
use crate::types::PathAddress;

/// Name of the operation that creates a resource.
pub const ADD: &str = "add";
/// Name of the operation that removes a resource.
pub const REMOVE: &str = "remove";
/// Name of the operation that renders a resource.
pub const READ_RESOURCE: &str = "read-resource";
/// Name of the operation that reads one attribute.
pub const READ_ATTRIBUTE: &str = "read-attribute";
/// Name of the operation that writes one attribute.
pub const WRITE_ATTRIBUTE: &str = "write-attribute";
/// Name of the operation that clears one attribute.
pub const UNDEFINE_ATTRIBUTE: &str = "undefine-attribute";

/// An ordered, replayable instruction applied against the resource tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootOperation {
    /// Identifier used in logs and reports
    #[serde(default)]
    pub id: OperationId,

    /// Operation name, e.g. `add`
    pub name: String,

    /// Target resource address
    #[serde(default)]
    pub address: PathAddress,

    /// Operation parameters as a JSON object
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,

    /// Whether a failure of this operation rolls back its whole batch
    #[serde(default)]
    pub rollback_on_failure: bool,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl BootOperation {
    /// Create an operation with no parameters.
    pub fn new(name: impl Into<String>, address: PathAddress) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            address,
            params: empty_params(),
            rollback_on_failure: false,
        }
    }

    /// Create an `add` operation with the given parameters.
    pub fn add(address: PathAddress, params: serde_json::Value) -> Self {
        Self::new(ADD, address).with_params(params)
    }

    /// Create a `remove` operation.
    pub fn remove(address: PathAddress) -> Self {
        Self::new(REMOVE, address)
    }

    /// Create a `write-attribute` operation.
    pub fn write_attribute(
        address: PathAddress,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self::new(WRITE_ATTRIBUTE, address)
            .with_params(serde_json::json!({ "name": name.into(), "value": value }))
    }

    /// Create a `read-attribute` operation.
    pub fn read_attribute(address: PathAddress, name: impl Into<String>) -> Self {
        Self::new(READ_ATTRIBUTE, address).with_params(serde_json::json!({ "name": name.into() }))
    }

    /// Replace the parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Mark this operation as rolling back its batch on failure.
    pub fn rolling_back_on_failure(mut self) -> Self {
        self.rollback_on_failure = true;
        self
    }

    /// Get a parameter by name.
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.get(name)
    }

    /// Get a string parameter by name.
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let op: BootOperation = serde_json::from_str(
            r#"{ "name": "add", "address": "subsystem=foo", "params": { "size": 3 } }"#,
        )
        .unwrap();
        assert_eq!(op.name, ADD);
        assert_eq!(op.address.to_string(), "subsystem=foo");
        assert_eq!(op.param("size"), Some(&serde_json::json!(3)));
        assert!(!op.rollback_on_failure);
        assert_ne!(op.id, BootOperation::new(ADD, op.address.clone()).id);
    }

    #[test]
    fn test_builders() {
        let op = BootOperation::write_attribute(
            "subsystem=foo".parse().unwrap(),
            "size",
            serde_json::json!(5),
        )
        .rolling_back_on_failure();
        assert_eq!(op.name, WRITE_ATTRIBUTE);
        assert_eq!(op.param_str("name"), Some("size"));
        assert!(op.rollback_on_failure);
    }
}
