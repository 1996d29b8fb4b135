//! In-memory configuration persister.

use parking_lot::RwLock;
use tracing::debug;

use keel_core::error::Result;
use keel_core::traits::ConfigurationPersister;
use keel_core::types::{BootOperation, ModelValue};

/// Persister that serves a fixed list of boot operations and keeps the
/// last stored model in memory.
#[derive(Debug, Default)]
pub struct InMemoryConfigurationPersister {
    operations: Vec<BootOperation>,
    stored: RwLock<Option<ModelValue>>,
}

impl InMemoryConfigurationPersister {
    /// Create a persister that loads `operations`.
    pub fn new(operations: Vec<BootOperation>) -> Self {
        Self {
            operations,
            stored: RwLock::new(None),
        }
    }

    /// The last model passed to `store`.
    pub fn stored_model(&self) -> Option<ModelValue> {
        self.stored.read().clone()
    }
}

impl ConfigurationPersister for InMemoryConfigurationPersister {
    fn load(&self) -> Result<Vec<BootOperation>> {
        Ok(self.operations.clone())
    }

    fn store(&self, model: &ModelValue) -> Result<()> {
        debug!("Stored configuration model");
        *self.stored.write() = Some(model.clone());
        Ok(())
    }
}
