//! The `deployment=*` resource.
//!
//! A deployment resource names content stored in the content repository.
//! Adding the resource takes a reference on the content under the token
//! `deployment=<name>`; removing it releases that reference once the
//! enclosing batch commits, since released content may be reclaimed.

use std::sync::Arc;

use tracing::{info, warn};

use keel_core::error::{ContentError, OperationError, RegistrationError, Result};
use keel_core::model::handlers::validate_add_params;
use keel_core::model::{
    AttributeDefinition, AttributeType, OperationContext, OperationDefinition, OperationEntry,
    OperationStepHandler, ResourceDefinition,
};
use keel_core::traits::ContentRepository;
use keel_core::types::operation::{ADD, REMOVE};
use keel_core::types::{BootOperation, ContentHash, ModelValue, PathElement, ReferenceToken};

/// Child type of deployment resources.
pub const DEPLOYMENT: &str = "deployment";
/// Attribute holding the hex digest of the deployed content.
pub const CONTENT: &str = "content";
/// Attribute holding the name the deployment runs under.
pub const RUNTIME_NAME: &str = "runtime-name";
/// Attribute recording whether the deployment is active.
pub const ENABLED: &str = "enabled";
/// Operation that activates a deployment.
pub const DEPLOY: &str = "deploy";
/// Operation that deactivates a deployment.
pub const UNDEPLOY: &str = "undeploy";

/// Definition of `deployment=*`, bound to a content repository.
pub fn deployment_definition(repository: Arc<dyn ContentRepository>) -> ResourceDefinition {
    ResourceDefinition::new(PathElement::wildcard(DEPLOYMENT))
        .with_description("A deployment backed by repository content")
        .with_attribute(
            AttributeDefinition::new(CONTENT, AttributeType::String)
                .required()
                .with_description("Hex SHA-256 digest of the deployment content"),
        )
        .with_attribute(
            AttributeDefinition::new(RUNTIME_NAME, AttributeType::String)
                .with_description("Name the deployment runs under"),
        )
        .with_attribute(
            AttributeDefinition::new(ENABLED, AttributeType::Boolean)
                .with_default(ModelValue::Bool(false))
                .with_description("Whether the deployment is active"),
        )
        .with_operation(OperationEntry::new(
            OperationDefinition::new(ADD).with_description("Add a deployment"),
            Arc::new(DeploymentAddHandler {
                repository: repository.clone(),
            }),
        ))
        .with_operation(OperationEntry::new(
            OperationDefinition::new(REMOVE).with_description("Remove a deployment"),
            Arc::new(DeploymentRemoveHandler { repository }),
        ))
        .with_operation(OperationEntry::new(
            OperationDefinition::new(DEPLOY)
                .runtime_only()
                .with_description("Activate the deployment"),
            Arc::new(DeploymentEnableHandler { enabled: true }),
        ))
        .with_operation(OperationEntry::new(
            OperationDefinition::new(UNDEPLOY)
                .runtime_only()
                .with_description("Deactivate the deployment"),
            Arc::new(DeploymentEnableHandler { enabled: false }),
        ))
}

fn reference_token(context: &OperationContext<'_>) -> ReferenceToken {
    let name = context
        .address()
        .last()
        .map(|element| element.value.as_str())
        .unwrap_or_default();
    ReferenceToken::new(format!("{}={}", DEPLOYMENT, name))
}

fn content_hash(value: Option<&ModelValue>) -> Result<ContentHash> {
    let hex = value
        .and_then(ModelValue::as_str)
        .ok_or_else(|| OperationError::InvalidParameter {
            parameter: CONTENT.to_string(),
            reason: "missing content digest".to_string(),
        })?;
    hex.parse().map_err(|e| {
        OperationError::InvalidParameter {
            parameter: CONTENT.to_string(),
            reason: format!("{}", e),
        }
        .into()
    })
}

struct DeploymentAddHandler {
    repository: Arc<dyn ContentRepository>,
}

impl OperationStepHandler for DeploymentAddHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        operation: &BootOperation,
    ) -> Result<ModelValue> {
        let attributes = validate_add_params(context.registration(), operation)?;
        let hash = content_hash(attributes.get(CONTENT))?;
        let token = reference_token(context);

        // the token is shared with an existing deployment of the same name
        if context.read_resource().is_ok() {
            return Err(RegistrationError::DuplicateResource(context.address().clone()).into());
        }

        self.repository.add_content_reference(&hash, &token)?;
        let resource = match context.create_resource() {
            Ok(resource) => resource,
            Err(e) => {
                self.repository.remove_content(&hash, &token)?;
                return Err(e);
            }
        };
        for (name, value) in attributes {
            resource.write_attribute(name, value);
        }

        let repository = self.repository.clone();
        context.on_rollback(move || {
            if let Err(e) = repository.remove_content(&hash, &token) {
                warn!(content = %hash, token = %token, "Failed to release content reference: {}", e);
            }
        });

        info!(deployment = %context.address(), content = %hash, "Added deployment");
        Ok(ModelValue::Null)
    }
}

struct DeploymentRemoveHandler {
    repository: Arc<dyn ContentRepository>,
}

impl OperationStepHandler for DeploymentRemoveHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        _operation: &BootOperation,
    ) -> Result<ModelValue> {
        let resource = context.read_resource()?;
        let hash = content_hash(resource.attribute(CONTENT).as_ref())?;
        let token = reference_token(context);

        context.remove_resource()?;

        let repository = self.repository.clone();
        let address = context.address().clone();
        context.on_commit(move |model| {
            // re-added under the same name and content within the batch
            let readded = model
                .resource(&address)
                .and_then(|resource| resource.attribute(CONTENT))
                .map_or(false, |content| content_hash(Some(&content)).ok() == Some(hash));
            if readded {
                return;
            }
            match repository.remove_content(&hash, &token) {
                Ok(()) => {}
                // released outside the model
                Err(keel_core::Error::Content(ContentError::ReferenceUnderflow { .. })) => {}
                Err(e) => {
                    warn!(deployment = %address, content = %hash, "Failed to release content reference: {}", e)
                }
            }
        });

        info!(deployment = %context.address(), "Removed deployment");
        Ok(ModelValue::Null)
    }
}

struct DeploymentEnableHandler {
    enabled: bool,
}

impl OperationStepHandler for DeploymentEnableHandler {
    fn execute(
        &self,
        context: &mut OperationContext<'_>,
        _operation: &BootOperation,
    ) -> Result<ModelValue> {
        context
            .read_resource()?
            .write_attribute(ENABLED, ModelValue::Bool(self.enabled));
        Ok(ModelValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentRepository;
    use keel_core::error::Error;
    use keel_core::model::ManagementModel;
    use keel_core::types::PathAddress;
    use serde_json::json;

    fn setup() -> (ManagementModel, Arc<InMemoryContentRepository>) {
        let repository = Arc::new(InMemoryContentRepository::new());
        let model = ManagementModel::new();
        model
            .register_sub_model(&PathAddress::root(), &deployment_definition(repository.clone()))
            .unwrap();
        (model, repository)
    }

    fn run(model: &ManagementModel, operation: &BootOperation) -> Result<ModelValue> {
        let registration = model.registration(&operation.address).unwrap();
        let entry = model
            .find_operation(&operation.address, &operation.name)
            .unwrap();
        let mut context = OperationContext::new(model, registration, &operation.address);
        let value = entry.handler.execute(&mut context, operation)?;
        for action in context.take_commit_actions() {
            action(model);
        }
        Ok(value)
    }

    fn app() -> PathAddress {
        "deployment=app.war".parse().unwrap()
    }

    #[test]
    fn test_add_references_content() {
        let (model, repository) = setup();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();

        run(&model, &BootOperation::add(app(), json!({ "content": hash.to_hex() }))).unwrap();

        assert_eq!(
            repository.references(&hash),
            vec![ReferenceToken::new("deployment=app.war")]
        );
        assert_eq!(
            model.resource(&app()).unwrap().attribute(CONTENT),
            Some(json!(hash.to_hex()))
        );
    }

    #[test]
    fn test_add_with_unknown_content_fails() {
        let (model, _repository) = setup();
        let missing = ContentHash::of(b"missing");

        let err = run(&model, &BootOperation::add(app(), json!({ "content": missing.to_hex() })))
            .unwrap_err();
        assert!(matches!(err, Error::Content(ContentError::NotFound(_))));
        assert!(model.resource(&app()).is_none());
    }

    #[test]
    fn test_add_with_malformed_digest_fails() {
        let (model, _repository) = setup();
        let err = run(&model, &BootOperation::add(app(), json!({ "content": "zz" }))).unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_duplicate_add_keeps_existing_reference() {
        let (model, repository) = setup();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        let add = BootOperation::add(app(), json!({ "content": hash.to_hex() }));
        run(&model, &add).unwrap();

        let err = run(&model, &add).unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateResource(_))
        ));
        assert_eq!(repository.references(&hash).len(), 1);
    }

    #[test]
    fn test_remove_releases_content() {
        let (model, repository) = setup();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        run(&model, &BootOperation::add(app(), json!({ "content": hash.to_hex() }))).unwrap();

        run(&model, &BootOperation::remove(app())).unwrap();
        assert!(model.resource(&app()).is_none());
        assert!(!repository.has_content(&hash));
    }

    #[test]
    fn test_deploy_toggles_enabled() {
        let (model, repository) = setup();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        run(&model, &BootOperation::add(app(), json!({ "content": hash.to_hex() }))).unwrap();

        run(&model, &BootOperation::new(DEPLOY, app())).unwrap();
        assert_eq!(
            model.resource(&app()).unwrap().attribute(ENABLED),
            Some(json!(true))
        );
        run(&model, &BootOperation::new(UNDEPLOY, app())).unwrap();
        assert_eq!(
            model.resource(&app()).unwrap().attribute(ENABLED),
            Some(json!(false))
        );
    }

    #[test]
    fn test_remove_defers_release_until_commit() {
        let (model, repository) = setup();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        run(&model, &BootOperation::add(app(), json!({ "content": hash.to_hex() }))).unwrap();

        let remove = BootOperation::remove(app());
        let registration = model.registration(&app()).unwrap();
        let entry = model.find_operation(&app(), REMOVE).unwrap();
        let mut context = OperationContext::new(&model, registration, &remove.address);
        entry.handler.execute(&mut context, &remove).unwrap();

        assert!(model.resource(&app()).is_none());
        assert_eq!(repository.references(&hash).len(), 1);

        for action in context.take_commit_actions() {
            action(&model);
        }
        assert!(!repository.has_content(&hash));
    }
}
