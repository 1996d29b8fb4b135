//! Core data types.
//!
//! This module defines the value types shared by every Keel component:
//! resource addresses, process and running modes, management operations,
//! and content digests.

pub mod address;
pub mod content;
pub mod mode;
pub mod operation;

pub use address::{AddressParseError, PathAddress, PathElement, WILDCARD};
pub use content::{ContentHash, ContentHasher, ReferenceToken};
pub use mode::{ProcessType, RunningMode};
pub use operation::BootOperation;

/// Attribute and parameter values use the JSON data model.
pub type ModelValue = serde_json::Value;
