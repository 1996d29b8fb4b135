//! Resource definitions.
//!
//! A `ResourceDefinition` is the value object handed to
//! `register_sub_model`. It declares everything that is legal at one path:
//! attributes, operations and their handlers, notifications, child
//! definitions, and the capabilities the resource provides or needs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::handlers::{ModelOnlyAddHandler, ModelOnlyRemoveHandler, OperationStepHandler};
use crate::error::{OperationError, Result};
use crate::types::operation::{ADD, REMOVE};
use crate::types::{ModelValue, PathElement};

/// Value type of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// UTF-8 string
    String,

    /// Signed integer
    Int,

    /// Boolean
    Boolean,

    /// Floating point number
    Double,

    /// List of values
    List,

    /// Nested object
    Object,

    /// Any JSON value
    Any,
}

impl AttributeType {
    /// Whether a value has this type.
    pub fn accepts(&self, value: &ModelValue) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Double => value.is_number(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "STRING",
            Self::Int => "INT",
            Self::Boolean => "BOOLEAN",
            Self::Double => "DOUBLE",
            Self::List => "LIST",
            Self::Object => "OBJECT",
            Self::Any => "ANY",
        };
        write!(f, "{}", name)
    }
}

/// Schema of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name
    pub name: String,

    /// Value type
    pub attribute_type: AttributeType,

    /// Whether a value must be supplied when the resource is added
    pub required: bool,

    /// Value readers should assume when none is stored
    pub default: Option<ModelValue>,

    /// Human-readable description
    pub description: String,
}

impl AttributeDefinition {
    /// Create an optional attribute with no default.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    /// Mark the attribute as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: ModelValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check a value against this definition.
    pub fn validate(&self, value: &ModelValue) -> Result<()> {
        if value.is_null() {
            if self.required {
                return Err(OperationError::InvalidParameter {
                    parameter: self.name.clone(),
                    reason: "required attribute cannot be undefined".to_string(),
                }
                .into());
            }
            return Ok(());
        }

        if !self.attribute_type.accepts(value) {
            return Err(OperationError::InvalidParameter {
                parameter: self.name.clone(),
                reason: format!("expected {}, got {}", self.attribute_type, value),
            }
            .into());
        }

        Ok(())
    }
}

/// Schema of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDefinition {
    /// Operation name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// The operation never modifies the model
    pub read_only: bool,

    /// The operation only affects runtime services
    pub runtime_only: bool,
}

impl OperationDefinition {
    /// Create a model-modifying operation definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            read_only: false,
            runtime_only: false,
        }
    }

    /// Mark the operation as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark the operation as runtime-only.
    pub fn runtime_only(mut self) -> Self {
        self.runtime_only = true;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// An operation definition bound to its handler.
#[derive(Clone)]
pub struct OperationEntry {
    /// The operation schema
    pub definition: OperationDefinition,

    /// The handler that executes it
    pub handler: Arc<dyn OperationStepHandler>,

    /// Whether descendants of the registering path inherit the operation
    pub inherited: bool,
}

impl OperationEntry {
    /// Bind a definition to a handler.
    pub fn new(definition: OperationDefinition, handler: Arc<dyn OperationStepHandler>) -> Self {
        Self {
            definition,
            handler,
            inherited: false,
        }
    }

    /// Make the operation available on every descendant registration.
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

impl fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationEntry")
            .field("definition", &self.definition)
            .field("inherited", &self.inherited)
            .finish()
    }
}

/// Description of a notification a resource may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDefinition {
    /// Notification type
    pub name: String,

    /// Human-readable description
    pub description: String,
}

impl NotificationDefinition {
    /// Create a notification description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Everything that is legal at one path of the resource tree.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    /// Path element relative to the parent registration
    pub path: PathElement,

    /// Human-readable description
    pub description: String,

    /// Attribute schemas
    pub attributes: Vec<AttributeDefinition>,

    /// Operations and their handlers
    pub operations: Vec<OperationEntry>,

    /// Notification descriptions
    pub notifications: Vec<NotificationDefinition>,

    /// Child definitions, registered recursively
    pub children: Vec<ResourceDefinition>,

    /// Capabilities provided by this resource
    pub capabilities: Vec<String>,

    /// Capabilities this resource requires from others
    pub requirements: Vec<String>,
}

impl ResourceDefinition {
    /// Create an empty definition at a path element.
    pub fn new(path: PathElement) -> Self {
        Self {
            path,
            description: String::new(),
            attributes: Vec::new(),
            operations: Vec::new(),
            notifications: Vec::new(),
            children: Vec::new(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare an operation.
    pub fn with_operation(mut self, operation: OperationEntry) -> Self {
        self.operations.push(operation);
        self
    }

    /// Declare the standard `add` and `remove` operations, which only touch
    /// the model.
    pub fn with_model_only_add_remove(self) -> Self {
        self.with_operation(OperationEntry::new(
            OperationDefinition::new(ADD).with_description("Add the resource"),
            Arc::new(ModelOnlyAddHandler),
        ))
        .with_operation(OperationEntry::new(
            OperationDefinition::new(REMOVE).with_description("Remove the resource"),
            Arc::new(ModelOnlyRemoveHandler),
        ))
    }

    /// Declare a notification.
    pub fn with_notification(mut self, notification: NotificationDefinition) -> Self {
        self.notifications.push(notification);
        self
    }

    /// Declare a child definition.
    pub fn with_child(mut self, child: ResourceDefinition) -> Self {
        self.children.push(child);
        self
    }

    /// Declare a provided capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Declare a required capability.
    pub fn with_requirement(mut self, capability: impl Into<String>) -> Self {
        self.requirements.push(capability.into());
        self
    }
}
