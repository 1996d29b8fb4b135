//! Pre-execution validation of boot operations.

use tracing::debug;

use keel_core::error::{OperationError, Result};
use keel_core::model::handlers::validate_add_params;
use keel_core::model::ManagementModel;
use keel_core::types::operation::ADD;
use keel_core::types::{BootOperation, PathAddress};

/// One exclusion: operations at addresses matching `address`, and named
/// `operation` when given, are not validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationExclusion {
    /// Address pattern; wildcard elements match any name
    pub address: PathAddress,

    /// Operation name, or every operation when `None`
    pub operation: Option<String>,
}

/// Set of exclusions consulted by the validator.
#[derive(Debug, Clone, Default)]
pub struct ValidationFilter {
    exclusions: Vec<ValidationExclusion>,
}

impl ValidationFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude operations matching `address` and, if given, `operation`.
    pub fn exclude(mut self, address: PathAddress, operation: Option<&str>) -> Self {
        self.exclusions.push(ValidationExclusion {
            address,
            operation: operation.map(str::to_string),
        });
        self
    }

    /// Whether `operation` is excluded from validation.
    pub fn is_excluded(&self, operation: &BootOperation) -> bool {
        self.exclusions.iter().any(|exclusion| {
            exclusion.address.matches(&operation.address)
                && exclusion
                    .operation
                    .as_deref()
                    .map_or(true, |name| name == operation.name)
        })
    }
}

/// Checks boot operations against the registered schema before replay.
#[derive(Debug, Clone, Default)]
pub struct OperationValidator {
    filter: ValidationFilter,
}

impl OperationValidator {
    /// Create a validator with no exclusions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator that skips operations the filter excludes.
    pub fn with_filter(filter: ValidationFilter) -> Self {
        Self { filter }
    }

    /// Validate every operation, failing on the first invalid one.
    pub fn validate(&self, model: &ManagementModel, operations: &[BootOperation]) -> Result<()> {
        for operation in operations {
            if self.filter.is_excluded(operation) {
                debug!(
                    operation = %operation.name,
                    address = %operation.address,
                    "Skipping validation"
                );
                continue;
            }
            Self::validate_one(model, operation)?;
        }
        Ok(())
    }

    fn validate_one(model: &ManagementModel, operation: &BootOperation) -> Result<()> {
        let registration = model.registration(&operation.address).ok_or_else(|| {
            OperationError::Validation(format!("no registration at {}", operation.address))
        })?;

        if model
            .find_operation(&operation.address, &operation.name)
            .is_none()
        {
            return Err(OperationError::Validation(format!(
                "unknown operation {} at {}",
                operation.name, operation.address
            ))
            .into());
        }

        if operation.name == ADD {
            validate_add_params(&registration, operation).map_err(|e| {
                OperationError::Validation(format!(
                    "invalid add at {}: {}",
                    operation.address, e
                ))
            })?;
        }

        Ok(())
    }
}
