//! Capability registry.
//!
//! Resources declare named capabilities they provide and capabilities they
//! need from other subsystems. Providers must be unique; requirements are
//! checked once every subsystem has registered, since registration order
//! across extensions is arbitrary.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{RegistrationError, Result};
use crate::types::PathAddress;

#[derive(Debug, Default)]
struct CapabilityState {
    providers: BTreeMap<String, PathAddress>,
    requirements: BTreeMap<String, Vec<PathAddress>>,
}

/// Registry of provided and required capabilities.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    state: RwLock<CapabilityState>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `provider` provides `capability`.
    pub fn register_capability(&self, capability: &str, provider: &PathAddress) -> Result<()> {
        let mut state = self.state.write();
        if let Some(existing) = state.providers.get(capability) {
            return Err(RegistrationError::DuplicateCapability {
                capability: capability.to_string(),
                provider: existing.clone(),
            }
            .into());
        }
        state
            .providers
            .insert(capability.to_string(), provider.clone());
        Ok(())
    }

    /// Record that `dependent` requires `capability`.
    pub fn register_requirement(&self, capability: &str, dependent: &PathAddress) {
        self.state
            .write()
            .requirements
            .entry(capability.to_string())
            .or_default()
            .push(dependent.clone());
    }

    /// Whether a capability has a provider.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.state.read().providers.contains_key(capability)
    }

    /// Address of the provider of a capability.
    pub fn provider_of(&self, capability: &str) -> Option<PathAddress> {
        self.state.read().providers.get(capability).cloned()
    }

    /// Names of all provided capabilities.
    pub fn capabilities(&self) -> Vec<String> {
        self.state.read().providers.keys().cloned().collect()
    }

    /// Drop every capability provided or required at an address.
    pub fn remove_registrations(&self, address: &PathAddress) {
        let mut state = self.state.write();
        state.providers.retain(|_, provider| provider != address);
        for dependents in state.requirements.values_mut() {
            dependents.retain(|dependent| dependent != address);
        }
        state.requirements.retain(|_, dependents| !dependents.is_empty());
    }

    /// Check that every requirement has a provider.
    pub fn validate(&self) -> Result<()> {
        let state = self.state.read();
        for (capability, dependents) in &state.requirements {
            if state.providers.contains_key(capability) {
                continue;
            }
            if let Some(required_by) = dependents.first() {
                return Err(RegistrationError::MissingCapability {
                    capability: capability.clone(),
                    required_by: required_by.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}
