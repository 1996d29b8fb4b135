//! Operation execution and validation.

pub mod executor;
pub mod validator;

pub use executor::{BatchOutcome, ModelController, OperationOutcome, OperationStatus};
pub use validator::{OperationValidator, ValidationExclusion, ValidationFilter};
