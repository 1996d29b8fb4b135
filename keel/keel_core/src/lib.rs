//! # Keel Core
//!
//! `keel_core` provides the building blocks of the Keel management
//! controller: the error taxonomy, typed identifiers, resource addresses,
//! the management resource tree with its schema registrations, and the
//! contracts implemented by the runtime.
//!
//! ## Model
//!
//! A Keel process manages a tree of resources. Every resource lives at a
//! `PathAddress`, an ordered list of `type=name` elements, and holds a map
//! of JSON attributes. Beside the resource tree sits the registration tree,
//! which describes which attributes, operations and child types are legal
//! at each address. Registrations may use the wildcard name `*` to describe
//! every resource of a type.
//!
//! Management operations (`add`, `remove`, `read-resource`,
//! `write-attribute`, ...) are resolved through the registration tree and
//! executed by `OperationStepHandler`s against the resource tree.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Keel components
//! - **id**: Strongly-typed identifier types
//! - **model**: Resource tree, registrations, capabilities and handlers
//! - **traits**: Content repository and configuration persister contracts
//! - **types**: Addresses, modes, operations and content digests
//! - **utils**: Log levels and model versions

pub mod error;
pub mod id;
pub mod model;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export key types and traits for convenience
pub use error::{Error, Result};
pub use id::{BootId, OperationId};
pub use model::{
    AttributeDefinition, AttributeType, CapabilityRegistry, ManagementModel,
    ManagementResourceRegistration, OperationDefinition, OperationStepHandler, Resource,
    ResourceDefinition,
};
pub use traits::{ConfigurationPersister, ContentHandle, ContentRepository};
pub use types::{
    BootOperation, ContentHash, ModelValue, PathAddress, PathElement, ProcessType,
    ReferenceToken, RunningMode,
};
pub use utils::{LogLevel, ModelVersion};
