//! Resource tree nodes.
//!
//! Each `Resource` owns its attribute map and its children behind one
//! read-write lock. Readers get consistent snapshots of a single node;
//! structural writers lock only the node they change, so a parent and its
//! children never need to be locked together for a write.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Map;

use crate::types::{ModelValue, PathAddress, PathElement};

#[derive(Debug, Default)]
struct ResourceState {
    model: Map<String, ModelValue>,
    // type -> name -> child
    children: BTreeMap<String, BTreeMap<String, Arc<Resource>>>,
    // created by a registration, not yet added by an operation
    placeholder: bool,
}

/// Consistent copy of one resource's attributes and child addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    /// Attribute values that are currently defined
    pub attributes: Map<String, ModelValue>,

    /// Child elements, ordered by type then name
    pub children: Vec<PathElement>,
}

/// A node of the resource tree.
#[derive(Debug, Default)]
pub struct Resource {
    state: RwLock<ResourceState>,
}

impl Resource {
    /// Create a resource with no attributes and no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty resource standing in for one a registration
    /// declares. The first `add` of its address adopts it instead of
    /// failing as a duplicate.
    pub fn placeholder() -> Self {
        Self {
            state: RwLock::new(ResourceState {
                placeholder: true,
                ..ResourceState::default()
            }),
        }
    }

    /// Create a resource with the given attributes.
    pub fn with_attributes(attributes: Map<String, ModelValue>) -> Self {
        Self {
            state: RwLock::new(ResourceState {
                model: attributes,
                ..ResourceState::default()
            }),
        }
    }

    /// Whether this resource is a registration placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.state.read().placeholder
    }

    /// Turn a placeholder into a regular resource.
    ///
    /// Returns `false` if the resource was not a placeholder.
    pub fn adopt(&self) -> bool {
        std::mem::replace(&mut self.state.write().placeholder, false)
    }

    /// Get the stored value of an attribute, if defined.
    pub fn attribute(&self, name: &str) -> Option<ModelValue> {
        self.state.read().model.get(name).cloned()
    }

    /// Copy of all defined attributes.
    pub fn attributes(&self) -> Map<String, ModelValue> {
        self.state.read().model.clone()
    }

    /// Store an attribute value, returning the previous one.
    pub fn write_attribute(&self, name: impl Into<String>, value: ModelValue) -> Option<ModelValue> {
        self.state.write().model.insert(name.into(), value)
    }

    /// Remove an attribute value, returning it.
    pub fn undefine_attribute(&self, name: &str) -> Option<ModelValue> {
        self.state.write().model.remove(name)
    }

    /// Get a child by element.
    pub fn child(&self, element: &PathElement) -> Option<Arc<Resource>> {
        self.state
            .read()
            .children
            .get(&element.key)
            .and_then(|names| names.get(&element.value))
            .cloned()
    }

    /// Whether a child exists at the element.
    pub fn has_child(&self, element: &PathElement) -> bool {
        self.child(element).is_some()
    }

    /// Insert a child unless the `(type, name)` slot is occupied.
    ///
    /// Returns the inserted child, or `None` when the slot was taken.
    pub fn add_child(&self, element: PathElement, child: Resource) -> Option<Arc<Resource>> {
        let mut state = self.state.write();
        let names = state.children.entry(element.key).or_default();
        if names.contains_key(&element.value) {
            return None;
        }
        let child = Arc::new(child);
        names.insert(element.value, child.clone());
        Some(child)
    }

    /// Remove a child, returning it.
    pub fn remove_child(&self, element: &PathElement) -> Option<Arc<Resource>> {
        let mut state = self.state.write();
        state
            .children
            .get_mut(&element.key)
            .and_then(|names| names.remove(&element.value))
    }

    /// Declare a child type so it renders even with no children.
    pub fn ensure_child_type(&self, child_type: &str) {
        let mut state = self.state.write();
        if !state.children.contains_key(child_type) {
            state.children.insert(child_type.to_string(), BTreeMap::new());
        }
    }

    /// Declared child types.
    pub fn child_types(&self) -> Vec<String> {
        self.state.read().children.keys().cloned().collect()
    }

    /// Names of the children of one type.
    pub fn child_names(&self, child_type: &str) -> Vec<String> {
        self.state
            .read()
            .children
            .get(child_type)
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Consistent copy of this node's attributes and child elements.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let state = self.state.read();
        let children = state
            .children
            .iter()
            .flat_map(|(key, names)| names.keys().map(move |name| PathElement::new(key, name)))
            .collect();
        ResourceSnapshot {
            attributes: state.model.clone(),
            children,
        }
    }

    /// Independent copy of this subtree.
    pub fn deep_clone(&self) -> Resource {
        let state = self.state.read();
        let children = state
            .children
            .iter()
            .map(|(key, names)| {
                let names = names
                    .iter()
                    .map(|(name, child)| (name.clone(), Arc::new(child.deep_clone())))
                    .collect();
                (key.clone(), names)
            })
            .collect();
        Resource {
            state: RwLock::new(ResourceState {
                model: state.model.clone(),
                children,
                placeholder: state.placeholder,
            }),
        }
    }

    /// Replace this node's attributes and children with another's.
    pub fn restore_from(&self, other: Resource) {
        let restored = other.state.into_inner();
        *self.state.write() = restored;
    }

    /// Walk from `root` to the resource at `address`.
    pub fn navigate(root: &Arc<Resource>, address: &PathAddress) -> Option<Arc<Resource>> {
        let mut current = root.clone();
        for element in address.elements() {
            current = current.child(element)?;
        }
        Some(current)
    }

    /// Render this subtree as JSON.
    ///
    /// Attributes and child types share one object; a child type with no
    /// children renders as `null`.
    pub fn to_model(&self) -> ModelValue {
        let state = self.state.read();
        let mut rendered = state.model.clone();
        for (key, names) in &state.children {
            let value = if names.is_empty() {
                ModelValue::Null
            } else {
                ModelValue::Object(
                    names
                        .iter()
                        .map(|(name, child)| (name.clone(), child.to_model()))
                        .collect(),
                )
            };
            rendered.insert(key.clone(), value);
        }
        ModelValue::Object(rendered)
    }
}
