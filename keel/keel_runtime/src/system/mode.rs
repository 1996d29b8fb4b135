//! Running mode control.
//!
//! The running mode decides which operations the controller accepts. It is
//! owned by the boot sequencer and passed explicitly to the controller; no
//! component reads it from global state.

use parking_lot::RwLock;
use tracing::info;

use keel_core::error::{OperationError, Result};
use keel_core::model::OperationDefinition;
use keel_core::types::{PathAddress, RunningMode};

#[derive(Debug)]
struct ModeState {
    mode: RunningMode,
    reload_required: bool,
}

/// Shared, mutable running mode of one process.
#[derive(Debug)]
pub struct RunningModeControl {
    state: RwLock<ModeState>,
}

impl Default for RunningModeControl {
    fn default() -> Self {
        Self::new(RunningMode::Normal)
    }
}

impl RunningModeControl {
    /// Create a control starting in `mode`.
    pub fn new(mode: RunningMode) -> Self {
        Self {
            state: RwLock::new(ModeState {
                mode,
                reload_required: false,
            }),
        }
    }

    /// Current running mode.
    pub fn running_mode(&self) -> RunningMode {
        self.state.read().mode
    }

    /// Switch the running mode.
    pub fn set_running_mode(&self, mode: RunningMode) {
        let mut state = self.state.write();
        if state.mode != mode {
            info!(from = %state.mode, to = %mode, "Running mode changed");
            state.mode = mode;
        }
    }

    /// Whether a change needs a reload to take effect.
    pub fn is_reload_required(&self) -> bool {
        self.state.read().reload_required
    }

    /// Mark or clear the reload-required flag.
    pub fn set_reload_required(&self, required: bool) {
        self.state.write().reload_required = required;
    }

    /// Check that the current mode permits an operation.
    pub fn check_permitted(
        &self,
        definition: &OperationDefinition,
        address: &PathAddress,
    ) -> Result<()> {
        let mode = self.running_mode();
        if mode.permits(definition.read_only, definition.runtime_only) {
            Ok(())
        } else {
            Err(OperationError::Rejected {
                operation: definition.name.clone(),
                address: address.clone(),
                mode,
            }
            .into())
        }
    }
}
