//! The management model.
//!
//! A `ManagementModel` pairs the resource tree with its registration tree
//! and the capability registry. All structural changes that must keep the
//! two trees consistent go through it.

pub mod capability;
pub mod definition;
pub mod handlers;
pub mod registration;
pub mod resource;

use std::sync::Arc;

pub use capability::CapabilityRegistry;
pub use definition::{
    AttributeDefinition, AttributeType, NotificationDefinition, OperationDefinition,
    OperationEntry, ResourceDefinition,
};
pub use handlers::{CommitAction, OperationContext, OperationStepHandler, RollbackAction};
pub use registration::ManagementResourceRegistration;
pub use resource::{Resource, ResourceSnapshot};

use crate::error::{OperationError, RegistrationError, Result};
use crate::types::operation::{READ_ATTRIBUTE, READ_RESOURCE, UNDEFINE_ATTRIBUTE, WRITE_ATTRIBUTE};
use crate::types::{ModelValue, PathAddress};

/// Resource tree, registration tree and capability registry of one process.
#[derive(Debug)]
pub struct ManagementModel {
    root_resource: Arc<Resource>,
    root_registration: Arc<ManagementResourceRegistration>,
    capabilities: Arc<CapabilityRegistry>,
}

impl Default for ManagementModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            root_resource: Arc::new(Resource::new()),
            root_registration: ManagementResourceRegistration::root(),
            capabilities: Arc::new(CapabilityRegistry::new()),
        }
    }

    /// Root of the resource tree.
    pub fn root_resource(&self) -> &Arc<Resource> {
        &self.root_resource
    }

    /// Root of the registration tree.
    pub fn root_registration(&self) -> &Arc<ManagementResourceRegistration> {
        &self.root_registration
    }

    /// The capability registry.
    pub fn capability_registry(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Register the operations every resource inherits from the root.
    pub fn register_global_operations(&self) -> Result<()> {
        let root = &self.root_registration;
        root.register_operation(
            OperationEntry::new(
                OperationDefinition::new(READ_RESOURCE)
                    .read_only()
                    .with_description("Read the attributes and children of a resource"),
                Arc::new(handlers::ReadResourceHandler),
            )
            .inherited(),
        )?;
        root.register_operation(
            OperationEntry::new(
                OperationDefinition::new(READ_ATTRIBUTE)
                    .read_only()
                    .with_description("Read one attribute, applying its default"),
                Arc::new(handlers::ReadAttributeHandler),
            )
            .inherited(),
        )?;
        root.register_operation(
            OperationEntry::new(
                OperationDefinition::new(WRITE_ATTRIBUTE)
                    .with_description("Write one attribute"),
                Arc::new(handlers::WriteAttributeHandler),
            )
            .inherited(),
        )?;
        root.register_operation(
            OperationEntry::new(
                OperationDefinition::new(UNDEFINE_ATTRIBUTE)
                    .with_description("Clear one attribute"),
                Arc::new(handlers::UndefineAttributeHandler),
            )
            .inherited(),
        )?;
        Ok(())
    }

    /// Register a definition under the registration at `parent`.
    ///
    /// Capabilities declared anywhere in the definition are registered, and
    /// an empty resource is created for every concrete (non-wildcard) path
    /// that does not exist yet and whose parent resource exists.
    pub fn register_sub_model(
        &self,
        parent: &PathAddress,
        definition: &ResourceDefinition,
    ) -> Result<Arc<ManagementResourceRegistration>> {
        let parent_registration =
            ManagementResourceRegistration::navigate(&self.root_registration, parent)
                .ok_or_else(|| RegistrationError::NoSuchRegistration(parent.clone()))?;

        let mut provided = Vec::new();
        collect_capabilities(parent, definition, &mut provided);
        for (index, (capability, _)) in provided.iter().enumerate() {
            let provider = self.capabilities.provider_of(capability).or_else(|| {
                provided[..index]
                    .iter()
                    .find(|(earlier, _)| earlier == capability)
                    .map(|(_, address)| address.clone())
            });
            if let Some(provider) = provider {
                return Err(RegistrationError::DuplicateCapability {
                    capability: capability.clone(),
                    provider,
                }
                .into());
            }
        }

        let registration = parent_registration.register_sub_model(definition)?;

        for (capability, provider) in &provided {
            self.capabilities.register_capability(capability, provider)?;
        }
        register_requirements(&self.capabilities, parent, definition);

        if !parent.is_wildcard() {
            if let Some(parent_resource) = self.resource(parent) {
                create_resources(&parent_resource, definition);
            }
        }

        Ok(registration)
    }

    /// Registration matching an address.
    pub fn registration(&self, address: &PathAddress) -> Option<Arc<ManagementResourceRegistration>> {
        ManagementResourceRegistration::navigate(&self.root_registration, address)
    }

    /// Resource at an address.
    pub fn resource(&self, address: &PathAddress) -> Option<Arc<Resource>> {
        Resource::navigate(&self.root_resource, address)
    }

    /// Find an operation for an address: registered on the matching
    /// registration itself, or inherited from the nearest ancestor.
    pub fn find_operation(&self, address: &PathAddress, name: &str) -> Option<OperationEntry> {
        let chain = ManagementResourceRegistration::chain(&self.root_registration, address)?;
        let (target, ancestors) = chain.split_last()?;
        if let Some(entry) = target.operation(name) {
            return Some(entry);
        }
        ancestors
            .iter()
            .rev()
            .filter_map(|registration| registration.operation(name))
            .find(|entry| entry.inherited)
    }

    /// Create an empty resource at `address`.
    ///
    /// The parent resource must exist and the `(type, name)` slot must be
    /// free, or hold a placeholder created by registration, which is
    /// adopted.
    pub fn add_resource(&self, address: &PathAddress) -> Result<Arc<Resource>> {
        let duplicate = || RegistrationError::DuplicateResource(address.clone());
        let (parent, element) = match (address.parent(), address.last()) {
            (Some(parent), Some(element)) => (parent, element.clone()),
            _ => return Err(duplicate().into()),
        };
        let parent_resource = self
            .resource(&parent)
            .ok_or(OperationError::NoSuchResource(parent))?;
        if let Some(existing) = parent_resource.child(&element) {
            return if existing.adopt() {
                Ok(existing)
            } else {
                Err(duplicate().into())
            };
        }
        Ok(parent_resource
            .add_child(element, Resource::new())
            .ok_or_else(duplicate)?)
    }

    /// Remove the resource at `address` with its subtree.
    pub fn remove_resource(&self, address: &PathAddress) -> Result<Arc<Resource>> {
        let not_found = || OperationError::NoSuchResource(address.clone());
        let parent = address.parent().ok_or_else(not_found)?;
        let element = address.last().ok_or_else(not_found)?;
        let parent_resource = self.resource(&parent).ok_or_else(not_found)?;
        Ok(parent_resource.remove_child(element).ok_or_else(not_found)?)
    }

    /// Render the whole resource tree as JSON.
    pub fn to_model(&self) -> ModelValue {
        self.root_resource.to_model()
    }

    /// Independent copy of the resource tree.
    pub fn snapshot_tree(&self) -> Resource {
        self.root_resource.deep_clone()
    }

    /// Replace the resource tree with a previously taken copy.
    pub fn restore_tree(&self, snapshot: Resource) {
        self.root_resource.restore_from(snapshot);
    }
}

fn collect_capabilities(
    parent: &PathAddress,
    definition: &ResourceDefinition,
    out: &mut Vec<(String, PathAddress)>,
) {
    let address = parent.append(definition.path.clone());
    for capability in &definition.capabilities {
        out.push((capability.clone(), address.clone()));
    }
    for child in &definition.children {
        collect_capabilities(&address, child, out);
    }
}

fn register_requirements(
    registry: &CapabilityRegistry,
    parent: &PathAddress,
    definition: &ResourceDefinition,
) {
    let address = parent.append(definition.path.clone());
    for requirement in &definition.requirements {
        registry.register_requirement(requirement, &address);
    }
    for child in &definition.children {
        register_requirements(registry, &address, child);
    }
}

fn create_resources(parent: &Resource, definition: &ResourceDefinition) {
    if definition.path.is_wildcard() {
        return;
    }
    parent.add_child(definition.path.clone(), Resource::placeholder());
    if let Some(resource) = parent.child(&definition.path) {
        for child in &definition.children {
            create_resources(&resource, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{BootOperation, PathElement};
    use serde_json::json;

    fn address(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_register_creates_empty_resource() {
        let model = ManagementModel::new();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "foo")),
            )
            .unwrap();

        let resource = model.resource(&address("subsystem=foo")).unwrap();
        assert!(resource.attributes().is_empty());
    }

    #[test]
    fn test_wildcard_registration_creates_no_resource() {
        let model = ManagementModel::new();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::wildcard("deployment")),
            )
            .unwrap();
        assert!(model.root_resource().child_types().is_empty());
        assert!(model.registration(&address("deployment=app.war")).is_some());
    }

    #[test]
    fn test_duplicate_capability_installs_nothing() {
        let model = ManagementModel::new();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "a"))
                    .with_capability("keel.shared"),
            )
            .unwrap();
        let err = model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "b"))
                    .with_capability("keel.shared"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateCapability { .. })
        ));
        assert!(model.registration(&address("subsystem=b")).is_none());
        assert!(model.resource(&address("subsystem=b")).is_none());
    }

    #[test]
    fn test_capability_declared_twice_in_one_definition_installs_nothing() {
        let model = ManagementModel::new();
        let err = model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "c"))
                    .with_capability("keel.shared")
                    .with_child(
                        ResourceDefinition::new(PathElement::new("handler", "inner"))
                            .with_capability("keel.shared"),
                    ),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateCapability { ref provider, .. })
                if provider.to_string() == "subsystem=c"
        ));
        assert!(model.registration(&address("subsystem=c")).is_none());
        assert!(model.capability_registry().provider_of("keel.shared").is_none());
    }

    #[test]
    fn test_find_operation_inherits_globals() {
        let model = ManagementModel::new();
        model.register_global_operations().unwrap();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "foo"))
                    .with_model_only_add_remove(),
            )
            .unwrap();

        let target = address("subsystem=foo");
        assert!(model.find_operation(&target, READ_RESOURCE).is_some());
        assert!(model.find_operation(&target, "add").is_some());
        assert!(model.find_operation(&PathAddress::root(), "add").is_none());
        assert!(model.find_operation(&address("subsystem=bar"), READ_RESOURCE).is_none());
    }

    #[test]
    fn test_read_attribute_applies_default() {
        let model = ManagementModel::new();
        model.register_global_operations().unwrap();
        let target = address("subsystem=foo");
        let registration = model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "foo")).with_attribute(
                    AttributeDefinition::new("size", AttributeType::Int).with_default(json!(10)),
                ),
            )
            .unwrap();

        let op = BootOperation::read_attribute(target.clone(), "size");
        let entry = model.find_operation(&target, READ_ATTRIBUTE).unwrap();
        let mut context = OperationContext::new(&model, registration, &target);
        let value = entry.handler.execute(&mut context, &op).unwrap();

        assert_eq!(value, json!(10));
        assert!(model.resource(&target).unwrap().attributes().is_empty());
    }

    #[test]
    fn test_add_adopts_registration_placeholder_once() {
        let model = ManagementModel::new();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "foo")),
            )
            .unwrap();
        let target = address("subsystem=foo");
        assert!(model.resource(&target).unwrap().is_placeholder());

        model.add_resource(&target).unwrap();
        assert!(!model.resource(&target).unwrap().is_placeholder());

        let err = model.add_resource(&target).unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateResource(_))
        ));
    }

    #[test]
    fn test_add_resource_requires_parent() {
        let model = ManagementModel::new();
        let err = model
            .add_resource(&address("subsystem=foo/handler=console"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::NoSuchResource(_))
        ));
    }
}
