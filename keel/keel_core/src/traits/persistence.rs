//! Configuration persistence trait definitions.

use crate::error::Result;
use crate::types::{BootOperation, ModelValue};

/// Source of boot operations and sink for the booted model.
///
/// Parsing a configuration format into operations is the implementor's
/// concern; the boot sequencer only sees the resulting operation list.
pub trait ConfigurationPersister: Send + Sync {
    /// Boot operations to replay, in order.
    fn load(&self) -> Result<Vec<BootOperation>>;

    /// Store the model produced by a successful boot.
    fn store(&self, model: &ModelValue) -> Result<()>;
}
