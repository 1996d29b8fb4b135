//! Management resource registrations.
//!
//! The registration tree is the schema companion of the resource tree.
//! Every node declares the attributes, operations, notifications and child
//! types that are legal at its path. Child registrations may use a wildcard
//! name (`deployment=*`) to describe every resource of a type.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::definition::{
    AttributeDefinition, NotificationDefinition, OperationEntry, ResourceDefinition,
};
use crate::error::{RegistrationError, Result};
use crate::types::{PathAddress, PathElement};

#[derive(Debug, Default)]
struct RegistrationState {
    attributes: BTreeMap<String, AttributeDefinition>,
    operations: BTreeMap<String, OperationEntry>,
    notifications: BTreeMap<String, NotificationDefinition>,
    children: BTreeMap<PathElement, Arc<ManagementResourceRegistration>>,
}

/// Schema for the resources at one (possibly wildcard) address.
#[derive(Debug)]
pub struct ManagementResourceRegistration {
    address: PathAddress,
    description: String,
    capabilities: Vec<String>,
    requirements: Vec<String>,
    state: RwLock<RegistrationState>,
}

impl ManagementResourceRegistration {
    /// Create the root registration.
    pub fn root() -> Arc<Self> {
        Arc::new(Self::empty(PathAddress::root(), "Root resource"))
    }

    fn empty(address: PathAddress, description: &str) -> Self {
        Self {
            address,
            description: description.to_string(),
            capabilities: Vec::new(),
            requirements: Vec::new(),
            state: RwLock::new(RegistrationState::default()),
        }
    }

    fn from_definition(parent: &PathAddress, definition: &ResourceDefinition) -> Result<Self> {
        let address = parent.append(definition.path.clone());
        let mut state = RegistrationState::default();

        for attribute in &definition.attributes {
            state
                .attributes
                .insert(attribute.name.clone(), attribute.clone());
        }
        for operation in &definition.operations {
            if state.operations.contains_key(operation.name()) {
                return Err(RegistrationError::DuplicateOperation {
                    operation: operation.name().to_string(),
                    address,
                }
                .into());
            }
            state
                .operations
                .insert(operation.name().to_string(), operation.clone());
        }
        for notification in &definition.notifications {
            state
                .notifications
                .insert(notification.name.clone(), notification.clone());
        }

        Ok(Self {
            address,
            description: definition.description.clone(),
            capabilities: definition.capabilities.clone(),
            requirements: definition.requirements.clone(),
            state: RwLock::new(state),
        })
    }

    /// Address of this registration (may contain wildcards).
    pub fn address(&self) -> &PathAddress {
        &self.address
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Capabilities provided by resources at this registration.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Capabilities required by resources at this registration.
    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    /// Register a child definition, and its children recursively.
    ///
    /// Fails with `DuplicateRegistration` if the element is already
    /// registered under this node; nothing is installed in that case.
    pub fn register_sub_model(&self, definition: &ResourceDefinition) -> Result<Arc<Self>> {
        let child = Arc::new(Self::from_definition(&self.address, definition)?);
        for grandchild in &definition.children {
            child.register_sub_model(grandchild)?;
        }

        let mut state = self.state.write();
        if state.children.contains_key(&definition.path) {
            return Err(RegistrationError::DuplicateRegistration(child.address.clone()).into());
        }
        state
            .children
            .insert(definition.path.clone(), child.clone());

        Ok(child)
    }

    /// Remove a child registration, returning it.
    pub fn unregister_sub_model(&self, element: &PathElement) -> Option<Arc<Self>> {
        self.state.write().children.remove(element)
    }

    /// Register an additional operation on this node.
    pub fn register_operation(&self, operation: OperationEntry) -> Result<()> {
        let mut state = self.state.write();
        if state.operations.contains_key(operation.name()) {
            return Err(RegistrationError::DuplicateOperation {
                operation: operation.name().to_string(),
                address: self.address.clone(),
            }
            .into());
        }
        state
            .operations
            .insert(operation.name().to_string(), operation);
        Ok(())
    }

    /// Register an additional attribute on this node.
    pub fn register_attribute(&self, attribute: AttributeDefinition) {
        self.state
            .write()
            .attributes
            .insert(attribute.name.clone(), attribute);
    }

    /// Register a notification description on this node.
    pub fn register_notification(&self, notification: NotificationDefinition) {
        self.state
            .write()
            .notifications
            .insert(notification.name.clone(), notification);
    }

    /// Get an attribute definition.
    pub fn attribute(&self, name: &str) -> Option<AttributeDefinition> {
        self.state.read().attributes.get(name).cloned()
    }

    /// All attribute definitions, ordered by name.
    pub fn attributes(&self) -> Vec<AttributeDefinition> {
        self.state.read().attributes.values().cloned().collect()
    }

    /// Get an operation registered directly on this node.
    pub fn operation(&self, name: &str) -> Option<OperationEntry> {
        self.state.read().operations.get(name).cloned()
    }

    /// Names of the operations registered directly on this node.
    pub fn operation_names(&self) -> Vec<String> {
        self.state.read().operations.keys().cloned().collect()
    }

    /// Names of the notifications registered on this node.
    pub fn notification_names(&self) -> Vec<String> {
        self.state.read().notifications.keys().cloned().collect()
    }

    /// Get the child registration for an element.
    ///
    /// An exact registration wins over a wildcard one.
    pub fn child(&self, element: &PathElement) -> Option<Arc<Self>> {
        let state = self.state.read();
        state
            .children
            .get(element)
            .or_else(|| state.children.get(&PathElement::wildcard(&element.key)))
            .cloned()
    }

    /// Elements of all child registrations.
    pub fn child_elements(&self) -> Vec<PathElement> {
        self.state.read().children.keys().cloned().collect()
    }

    /// Walk from `root` to the registration matching `address`.
    pub fn navigate(root: &Arc<Self>, address: &PathAddress) -> Option<Arc<Self>> {
        let mut current = root.clone();
        for element in address.elements() {
            current = current.child(element)?;
        }
        Some(current)
    }

    /// Registrations from `root` down to `address`, root first.
    pub fn chain(root: &Arc<Self>, address: &PathAddress) -> Option<Vec<Arc<Self>>> {
        let mut chain = vec![root.clone()];
        for element in address.elements() {
            let next = chain.last()?.child(element)?;
            chain.push(next);
        }
        Some(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::definition::AttributeType;

    fn subsystem(name: &str) -> ResourceDefinition {
        ResourceDefinition::new(PathElement::new("subsystem", name))
            .with_attribute(AttributeDefinition::new("size", AttributeType::Int))
            .with_model_only_add_remove()
    }

    #[test]
    fn test_register_sub_model() {
        let root = ManagementResourceRegistration::root();
        let child = root.register_sub_model(&subsystem("foo")).unwrap();
        assert_eq!(child.address().to_string(), "subsystem=foo");
        assert!(child.attribute("size").is_some());
        assert_eq!(child.operation_names(), vec!["add", "remove"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let root = ManagementResourceRegistration::root();
        root.register_sub_model(&subsystem("foo")).unwrap();
        let err = root.register_sub_model(&subsystem("foo")).unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateRegistration(_))
        ));
        assert_eq!(root.child_elements().len(), 1);
    }

    #[test]
    fn test_recursive_registration_and_wildcard_lookup() {
        let root = ManagementResourceRegistration::root();
        let definition = subsystem("logging")
            .with_child(ResourceDefinition::new(PathElement::wildcard("handler")));
        root.register_sub_model(&definition).unwrap();

        let address: PathAddress = "subsystem=logging/handler=console".parse().unwrap();
        let handler = ManagementResourceRegistration::navigate(&root, &address).unwrap();
        assert_eq!(handler.address().to_string(), "subsystem=logging/handler=*");

        let chain = ManagementResourceRegistration::chain(&root, &address).unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_duplicate_child_definitions_fail() {
        let root = ManagementResourceRegistration::root();
        let definition = subsystem("logging")
            .with_child(ResourceDefinition::new(PathElement::wildcard("handler")))
            .with_child(ResourceDefinition::new(PathElement::wildcard("handler")));
        assert!(root.register_sub_model(&definition).is_err());
        assert!(root.child_elements().is_empty());
    }
}
