//! Deployer chains.
//!
//! Extensions register deployment processors while the model boots. The
//! registrations are collected here and ordered by phase, then priority.
//! Once boot completes the sequencer takes the ordered chain and clears the
//! collection.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Deployment processing phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Discover the deployment structure
    Structure,

    /// Parse deployment descriptors
    Parse,

    /// Resolve dependencies
    Dependencies,

    /// Configure the deployment's module
    ConfigureModule,

    /// Work that needs the module
    PostModule,

    /// Install runtime services
    Install,

    /// Release boot-time resources
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structure => "STRUCTURE",
            Self::Parse => "PARSE",
            Self::Dependencies => "DEPENDENCIES",
            Self::ConfigureModule => "CONFIGURE_MODULE",
            Self::PostModule => "POST_MODULE",
            Self::Install => "INSTALL",
            Self::Cleanup => "CLEANUP",
        };
        write!(f, "{}", name)
    }
}

/// One deployment processor registered by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployerRegistration {
    /// Subsystem that registered the processor
    pub subsystem: String,

    /// Phase the processor runs in
    pub phase: Phase,

    /// Order within the phase; lower runs first
    pub priority: u32,

    /// Processor name
    pub processor: String,
}

/// Collection of processor registrations made during boot.
#[derive(Debug, Default)]
pub struct DeployerChains {
    registrations: Mutex<Vec<DeployerRegistration>>,
}

impl DeployerChains {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processor.
    pub fn add(
        &self,
        subsystem: impl Into<String>,
        phase: Phase,
        priority: u32,
        processor: impl Into<String>,
    ) {
        let registration = DeployerRegistration {
            subsystem: subsystem.into(),
            phase,
            priority,
            processor: processor.into(),
        };
        debug!(
            subsystem = %registration.subsystem,
            phase = %phase,
            priority,
            processor = %registration.processor,
            "Registered deployment processor"
        );
        self.registrations.lock().push(registration);
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Registrations for one phase, by priority.
    pub fn chain(&self, phase: Phase) -> Vec<DeployerRegistration> {
        let mut chain: Vec<_> = self
            .registrations
            .lock()
            .iter()
            .filter(|registration| registration.phase == phase)
            .cloned()
            .collect();
        // stable, so equal priorities keep registration order
        chain.sort_by_key(|registration| registration.priority);
        chain
    }

    /// Take every registration ordered by phase then priority, leaving the
    /// collection empty.
    pub fn take_ordered(&self) -> Vec<DeployerRegistration> {
        let mut ordered = std::mem::take(&mut *self.registrations.lock());
        ordered.sort_by_key(|registration| (registration.phase, registration.priority));
        ordered
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.registrations.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_orders_by_priority() {
        let chains = DeployerChains::new();
        chains.add("web", Phase::Parse, 200, "web-descriptor");
        chains.add("ee", Phase::Parse, 100, "ee-descriptor");
        chains.add("web", Phase::Install, 0, "web-install");

        let parse: Vec<_> = chains
            .chain(Phase::Parse)
            .into_iter()
            .map(|registration| registration.processor)
            .collect();
        assert_eq!(parse, vec!["ee-descriptor", "web-descriptor"]);
    }

    #[test]
    fn test_take_ordered_empties_collection() {
        let chains = DeployerChains::new();
        chains.add("web", Phase::Install, 0, "install");
        chains.add("web", Phase::Structure, 5, "structure");

        let ordered = chains.take_ordered();
        assert_eq!(ordered[0].phase, Phase::Structure);
        assert_eq!(ordered[1].phase, Phase::Install);
        assert!(chains.is_empty());
    }
}
