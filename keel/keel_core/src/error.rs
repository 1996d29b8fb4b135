//! Error types for the Keel management controller.
//!
//! This module defines the error hierarchy shared by every Keel component.
//! Errors are grouped by concern: schema registration, boot sequencing,
//! operation execution and content storage. The root error type, `Error`,
//! wraps each of them so callers can handle failures uniformly.

use crate::types::{ContentHash, PathAddress, ReferenceToken, RunningMode};
use thiserror::Error;

/// Root error type for Keel.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema or resource registration errors
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Boot sequencing errors
    #[error("Boot error: {0}")]
    Boot(#[from] BootError),

    /// Management operation errors
    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    /// Content repository errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// General runtime errors
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised while building the registration and resource trees.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A registration already exists at the address
    #[error("Duplicate registration at {0}")]
    DuplicateRegistration(PathAddress),

    /// A resource already exists at the address
    #[error("Duplicate resource at {0}")]
    DuplicateResource(PathAddress),

    /// No registration exists at the address
    #[error("No registration at {0}")]
    NoSuchRegistration(PathAddress),

    /// The operation is already registered at the address
    #[error("Operation {operation} already registered at {address}")]
    DuplicateOperation {
        /// Operation name
        operation: String,

        /// Registration address
        address: PathAddress,
    },

    /// The capability is already provided by another registration
    #[error("Capability {capability} already provided by {provider}")]
    DuplicateCapability {
        /// Capability name
        capability: String,

        /// Address of the existing provider
        provider: PathAddress,
    },

    /// A required capability has no provider
    #[error("Capability {capability} required by {required_by} is not provided")]
    MissingCapability {
        /// Capability name
        capability: String,

        /// Address of the registration requiring it
        required_by: PathAddress,
    },
}

/// Errors raised by the boot sequencer.
#[derive(Debug, Error)]
pub enum BootError {
    /// An initialization hook or extension failed
    #[error("Initialization of {component} failed: {reason}")]
    InitializationFailure {
        /// The hook or extension that failed
        component: String,

        /// Failure description
        reason: String,
    },

    /// The requested stage has already run
    #[error("Boot stage {0} already completed")]
    StageAlreadyCompleted(String),

    /// The requested stage cannot run from the current state
    #[error("Boot stage {requested} requested while in state {current}")]
    OutOfOrder {
        /// Stage that was requested
        requested: String,

        /// State the sequencer was in
        current: String,
    },

    /// The sequence failed earlier and cannot continue
    #[error("Boot sequence has failed")]
    SequenceFailed,

    /// Steady-state access before the sequence completed
    #[error("Controller is not started (state {0})")]
    NotStarted(String),
}

/// Errors raised while executing management operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The running mode does not permit the operation
    #[error("Operation {operation} at {address} rejected in {mode} mode")]
    Rejected {
        /// Operation name
        operation: String,

        /// Target address
        address: PathAddress,

        /// Running mode at the time
        mode: RunningMode,
    },

    /// No resource exists at the address
    #[error("No resource at {0}")]
    NoSuchResource(PathAddress),

    /// The operation is not registered for the address
    #[error("Unknown operation {operation} at {address}")]
    UnknownOperation {
        /// Operation name
        operation: String,

        /// Target address
        address: PathAddress,
    },

    /// An operation parameter is invalid
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,

        /// Failure description
        reason: String,
    },

    /// A handler failed while executing
    #[error("Operation {operation} failed: {reason}")]
    HandlerFailed {
        /// Operation name
        operation: String,

        /// Failure description
        reason: String,
    },

    /// Pre-execution validation failed
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Errors raised by content repositories.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Stored bytes do not hash to their digest
    #[error("Content integrity error: expected {expected}, got {actual}")]
    IntegrityError {
        /// Digest the content is stored under
        expected: ContentHash,

        /// Digest of the bytes actually read
        actual: ContentHash,
    },

    /// Content could not be read
    #[error("Content unreadable: {0}")]
    Unreadable(String),

    /// No content is stored under the digest
    #[error("Content not found: {0}")]
    NotFound(ContentHash),

    /// Removal of a reference that was never added or is already removed
    #[error("Reference {token} not held on content {hash}")]
    ReferenceUnderflow {
        /// Content digest
        hash: ContentHash,

        /// Reference token
        token: ReferenceToken,
    },
}

/// Result type used throughout Keel.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let reg_err = RegistrationError::DuplicateRegistration(PathAddress::root());
        let error: Error = reg_err.into();
        assert!(matches!(
            error,
            Error::Registration(RegistrationError::DuplicateRegistration(_))
        ));

        let content_err = ContentError::NotFound(ContentHash::of(b"x"));
        let error: Error = content_err.into();
        assert!(matches!(error, Error::Content(ContentError::NotFound(_))));
    }

    #[test]
    fn test_error_display() {
        let address: PathAddress = "subsystem=foo".parse().unwrap();
        let error: Error = RegistrationError::DuplicateRegistration(address).into();
        let display = format!("{}", error);
        assert!(display.contains("Duplicate registration at subsystem=foo"));
    }
}
