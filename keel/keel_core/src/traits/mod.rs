//! Core traits at the seams between Keel components.
//!
//! - `ContentRepository`: content-addressable artifact storage
//! - `ConfigurationPersister`: source of boot operations and sink for the
//!   booted model
//!
//! The operation handler contract lives with the model in
//! `crate::model::handlers`.

pub mod content;
pub mod persistence;

pub use content::{ContentHandle, ContentRepository};
pub use persistence::ConfigurationPersister;
