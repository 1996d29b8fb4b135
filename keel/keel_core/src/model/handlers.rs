//! Operation step handlers.
//!
//! A handler executes one operation against the resource tree through an
//! `OperationContext`. Handlers that cause side effects outside the tree
//! register rollback actions on the context; the tree itself is restored by
//! the caller when a batch is rolled back. Effects that cannot be undone are
//! registered as commit actions and run only once the enclosing batch has
//! succeeded.

use std::sync::Arc;

use serde_json::Map;

use super::registration::ManagementResourceRegistration;
use super::resource::Resource;
use super::ManagementModel;
use crate::error::{OperationError, Result};
use crate::types::{BootOperation, ModelValue, PathAddress};

/// Compensating action run when an executed operation is rolled back.
pub type RollbackAction = Box<dyn FnOnce() + Send>;

/// Deferred action run after the enclosing batch commits, against the
/// committed model.
pub type CommitAction = Box<dyn FnOnce(&ManagementModel) + Send>;

/// Executes one operation.
///
/// A handler that fails must leave the resource tree as it found it.
/// Effects outside the tree are undone through rollback actions registered
/// on the context, or deferred until commit when they cannot be undone.
pub trait OperationStepHandler: Send + Sync {
    /// Execute `operation` against the resource addressed by `context`.
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue>;
}

/// Access to the model for one executing operation.
pub struct OperationContext<'a> {
    model: &'a ManagementModel,
    registration: Arc<ManagementResourceRegistration>,
    address: &'a PathAddress,
    rollback_actions: Vec<RollbackAction>,
    commit_actions: Vec<CommitAction>,
}

impl<'a> OperationContext<'a> {
    /// Create a context for an operation at `address`.
    pub fn new(
        model: &'a ManagementModel,
        registration: Arc<ManagementResourceRegistration>,
        address: &'a PathAddress,
    ) -> Self {
        Self {
            model,
            registration,
            address,
            rollback_actions: Vec::new(),
            commit_actions: Vec::new(),
        }
    }

    /// Target address.
    pub fn address(&self) -> &PathAddress {
        self.address
    }

    /// Registration matching the target address.
    pub fn registration(&self) -> &Arc<ManagementResourceRegistration> {
        &self.registration
    }

    /// The whole model.
    pub fn model(&self) -> &ManagementModel {
        self.model
    }

    /// The resource at the target address.
    pub fn read_resource(&self) -> Result<Arc<Resource>> {
        self.model
            .resource(self.address)
            .ok_or_else(|| OperationError::NoSuchResource(self.address.clone()).into())
    }

    /// Create an empty resource at the target address.
    pub fn create_resource(&self) -> Result<Arc<Resource>> {
        self.model.add_resource(self.address)
    }

    /// Remove the resource at the target address.
    pub fn remove_resource(&self) -> Result<Arc<Resource>> {
        self.model.remove_resource(self.address)
    }

    /// Register a compensating action for rollback.
    pub fn on_rollback(&mut self, action: impl FnOnce() + Send + 'static) {
        self.rollback_actions.push(Box::new(action));
    }

    /// Take the registered rollback actions, in registration order.
    pub fn take_rollback_actions(&mut self) -> Vec<RollbackAction> {
        std::mem::take(&mut self.rollback_actions)
    }

    /// Defer an action until the enclosing batch commits.
    pub fn on_commit(&mut self, action: impl FnOnce(&ManagementModel) + Send + 'static) {
        self.commit_actions.push(Box::new(action));
    }

    /// Take the deferred commit actions, in registration order.
    pub fn take_commit_actions(&mut self) -> Vec<CommitAction> {
        std::mem::take(&mut self.commit_actions)
    }

    /// The declared value of an attribute, or its default.
    pub fn resolve_attribute(&self, resource: &Resource, name: &str) -> Result<ModelValue> {
        let definition = self.registration.attribute(name).ok_or_else(|| {
            OperationError::InvalidParameter {
                parameter: name.to_string(),
                reason: format!("no attribute {} at {}", name, self.address),
            }
        })?;
        Ok(resource
            .attribute(name)
            .or(definition.default)
            .unwrap_or(ModelValue::Null))
    }
}

fn required_str<'o>(operation: &'o BootOperation, name: &str) -> Result<&'o str> {
    operation.param_str(name).ok_or_else(|| {
        OperationError::InvalidParameter {
            parameter: name.to_string(),
            reason: "missing or not a string".to_string(),
        }
        .into()
    })
}

/// Validate `add` parameters against the registration and build the
/// attribute map to store. Only supplied values are stored.
pub fn validate_add_params(
    registration: &ManagementResourceRegistration,
    operation: &BootOperation,
) -> Result<Map<String, ModelValue>> {
    let params = match &operation.params {
        ModelValue::Object(params) => params.clone(),
        ModelValue::Null => Map::new(),
        other => {
            return Err(OperationError::InvalidParameter {
                parameter: "params".to_string(),
                reason: format!("expected an object, got {}", other),
            }
            .into())
        }
    };

    for (name, value) in &params {
        let definition =
            registration
                .attribute(name)
                .ok_or_else(|| OperationError::InvalidParameter {
                    parameter: name.clone(),
                    reason: format!("not an attribute of {}", registration.address()),
                })?;
        definition.validate(value)?;
    }

    for definition in registration.attributes() {
        if definition.required && !params.contains_key(&definition.name) {
            return Err(OperationError::InvalidParameter {
                parameter: definition.name,
                reason: "required attribute missing".to_string(),
            }
            .into());
        }
    }

    Ok(params)
}

/// `add` that creates the resource and stores the supplied attributes.
pub struct ModelOnlyAddHandler;

impl OperationStepHandler for ModelOnlyAddHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let attributes = validate_add_params(context.registration(), operation)?;
        let resource = context.create_resource()?;
        for (name, value) in attributes {
            resource.write_attribute(name, value);
        }
        Ok(ModelValue::Null)
    }
}

/// `remove` that deletes the resource and its subtree.
pub struct ModelOnlyRemoveHandler;

impl OperationStepHandler for ModelOnlyRemoveHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        _operation: &BootOperation,
    ) -> Result<ModelValue> {
        context.remove_resource()?;
        Ok(ModelValue::Null)
    }
}

/// `read-resource`, optionally recursive and with defaults applied.
pub struct ReadResourceHandler;

impl OperationStepHandler for ReadResourceHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let recursive = operation
            .param("recursive")
            .and_then(ModelValue::as_bool)
            .unwrap_or(false);
        let include_defaults = operation
            .param("include-defaults")
            .and_then(ModelValue::as_bool)
            .unwrap_or(true);

        let resource = context.read_resource()?;
        let mut result = resource.attributes();

        if include_defaults {
            for definition in context.registration().attributes() {
                if let Some(default) = definition.default {
                    result.entry(definition.name).or_insert(default);
                }
            }
        }

        for child_type in resource.child_types() {
            let names = resource.child_names(&child_type);
            let value = if names.is_empty() {
                ModelValue::Null
            } else {
                let mut children = Map::new();
                for name in names {
                    let element = crate::types::PathElement::new(&child_type, &name);
                    let rendered = match (recursive, resource.child(&element)) {
                        (true, Some(child)) => child.to_model(),
                        _ => ModelValue::Null,
                    };
                    children.insert(name, rendered);
                }
                ModelValue::Object(children)
            };
            result.insert(child_type, value);
        }

        Ok(ModelValue::Object(result))
    }
}

/// `read-attribute`, applying the declared default.
pub struct ReadAttributeHandler;

impl OperationStepHandler for ReadAttributeHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let name = required_str(operation, "name")?;
        let resource = context.read_resource()?;
        context.resolve_attribute(&resource, name)
    }
}

/// `write-attribute`.
pub struct WriteAttributeHandler;

impl OperationStepHandler for WriteAttributeHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let name = required_str(operation, "name")?;
        let value = operation.param("value").cloned().unwrap_or(ModelValue::Null);
        let definition =
            context
                .registration()
                .attribute(name)
                .ok_or_else(|| OperationError::InvalidParameter {
                    parameter: name.to_string(),
                    reason: format!("no attribute {} at {}", name, context.address()),
                })?;
        definition.validate(&value)?;

        let resource = context.read_resource()?;
        if value.is_null() {
            resource.undefine_attribute(name);
        } else {
            resource.write_attribute(name, value);
        }
        Ok(ModelValue::Null)
    }
}

/// `undefine-attribute`.
pub struct UndefineAttributeHandler;

impl OperationStepHandler for UndefineAttributeHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let name = required_str(operation, "name")?;
        let definition =
            context
                .registration()
                .attribute(name)
                .ok_or_else(|| OperationError::InvalidParameter {
                    parameter: name.to_string(),
                    reason: format!("no attribute {} at {}", name, context.address()),
                })?;
        definition.validate(&ModelValue::Null)?;

        context.read_resource()?.undefine_attribute(name);
        Ok(ModelValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::definition::{AttributeDefinition, AttributeType, ResourceDefinition};
    use crate::types::operation::{READ_RESOURCE, REMOVE, WRITE_ATTRIBUTE};
    use crate::types::PathElement;
    use serde_json::json;

    fn model() -> ManagementModel {
        let model = ManagementModel::new();
        model.register_global_operations().unwrap();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::new("subsystem", "logging"))
                    .with_model_only_add_remove()
                    .with_attribute(AttributeDefinition::new("level", AttributeType::String))
                    .with_child(
                        ResourceDefinition::new(PathElement::wildcard("handler"))
                            .with_model_only_add_remove()
                            .with_attribute(
                                AttributeDefinition::new("target", AttributeType::String)
                                    .required(),
                            )
                            .with_attribute(
                                AttributeDefinition::new("autoflush", AttributeType::Boolean)
                                    .with_default(json!(true)),
                            ),
                    ),
            )
            .unwrap();
        model
    }

    fn run(model: &ManagementModel, operation: &BootOperation) -> Result<ModelValue> {
        let registration = model.registration(&operation.address).unwrap();
        let entry = model
            .find_operation(&operation.address, &operation.name)
            .unwrap();
        let mut context = OperationContext::new(model, registration, &operation.address);
        entry.handler.execute(&mut context, operation)
    }

    fn handler(name: &str) -> PathAddress {
        format!("subsystem=logging/handler={}", name).parse().unwrap()
    }

    #[test]
    fn test_add_stores_only_supplied_values() {
        let model = model();
        run(&model, &BootOperation::add(handler("console"), json!({ "target": "stdout" })))
            .unwrap();

        let resource = model.resource(&handler("console")).unwrap();
        assert_eq!(resource.attributes().len(), 1);
        assert_eq!(resource.attribute("autoflush"), None);
    }

    #[test]
    fn test_add_rejects_unknown_and_missing_attributes() {
        let model = model();

        let err = run(
            &model,
            &BootOperation::add(handler("console"), json!({ "target": "stdout", "color": 1 })),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::InvalidParameter { ref parameter, .. }) if parameter == "color"
        ));

        let err = run(&model, &BootOperation::add(handler("console"), json!({}))).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::InvalidParameter { ref parameter, .. }) if parameter == "target"
        ));
        assert!(model.resource(&handler("console")).is_none());
    }

    #[test]
    fn test_add_rejects_wrong_type() {
        let model = model();
        let err = run(&model, &BootOperation::add(handler("console"), json!({ "target": 7 })))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_write_null_undefines() {
        let model = model();
        let logging: PathAddress = "subsystem=logging".parse().unwrap();
        run(&model, &BootOperation::write_attribute(logging.clone(), "level", json!("DEBUG")))
            .unwrap();
        assert_eq!(
            model.resource(&logging).unwrap().attribute("level"),
            Some(json!("DEBUG"))
        );

        run(&model, &BootOperation::write_attribute(logging.clone(), "level", json!(null)))
            .unwrap();
        assert_eq!(model.resource(&logging).unwrap().attribute("level"), None);
    }

    #[test]
    fn test_write_to_missing_resource_fails() {
        let model = model();
        let op = BootOperation::new(WRITE_ATTRIBUTE, handler("missing"))
            .with_params(json!({ "name": "target", "value": "stderr" }));
        let err = run(&model, &op).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::NoSuchResource(_))
        ));
    }

    #[test]
    fn test_read_resource_applies_defaults_and_recurses() {
        let model = model();
        run(&model, &BootOperation::add(handler("file"), json!({ "target": "server.log" })))
            .unwrap();

        let value = run(
            &model,
            &BootOperation::new(READ_RESOURCE, handler("file")),
        )
        .unwrap();
        assert_eq!(value, json!({ "target": "server.log", "autoflush": true }));

        let logging: PathAddress = "subsystem=logging".parse().unwrap();
        let shallow = run(&model, &BootOperation::new(READ_RESOURCE, logging.clone())).unwrap();
        assert_eq!(shallow, json!({ "handler": { "file": null } }));

        let deep = run(
            &model,
            &BootOperation::new(READ_RESOURCE, logging).with_params(json!({ "recursive": true })),
        )
        .unwrap();
        assert_eq!(
            deep,
            json!({ "handler": { "file": { "target": "server.log" } } })
        );
    }

    #[test]
    fn test_remove_drops_subtree() {
        let model = model();
        run(&model, &BootOperation::add(handler("file"), json!({ "target": "a.log" }))).unwrap();
        let logging: PathAddress = "subsystem=logging".parse().unwrap();

        run(&model, &BootOperation::new(REMOVE, logging.clone())).unwrap();
        assert!(model.resource(&logging).is_none());
        assert!(model.resource(&handler("file")).is_none());

        let err = run(&model, &BootOperation::new(REMOVE, logging)).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::NoSuchResource(_))
        ));
    }

    #[test]
    fn test_rollback_actions_are_collected_in_order() {
        let model = model();
        let address = PathAddress::root();
        let mut context =
            OperationContext::new(&model, model.root_registration().clone(), &address);
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            context.on_rollback(move || log.lock().push(i));
        }

        for action in context.take_rollback_actions().into_iter().rev() {
            action();
        }
        assert_eq!(*log.lock(), vec![2, 1, 0]);
        assert!(context.take_rollback_actions().is_empty());
    }

    #[test]
    fn test_commit_actions_see_the_model() {
        let model = model();
        let address = PathAddress::root();
        let mut context =
            OperationContext::new(&model, model.root_registration().clone(), &address);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        context.on_commit(move |model| {
            recorder
                .lock()
                .push(model.resource(&PathAddress::root()).is_some())
        });

        assert!(context.take_rollback_actions().is_empty());
        for action in context.take_commit_actions() {
            action(&model);
        }
        assert_eq!(*seen.lock(), vec![true]);
        assert!(context.take_commit_actions().is_empty());
    }
}
