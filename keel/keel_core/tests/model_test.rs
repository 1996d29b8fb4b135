//! Integration tests for the Keel management model.
//!
//! These tests drive the model through its public API the way the runtime
//! does: register definitions, execute handlers, and read the tree back.

use std::sync::Arc;
use std::thread;

use serde_json::json;

use keel_core::error::{Error, OperationError, RegistrationError};
use keel_core::model::{OperationContext, OperationEntry};
use keel_core::types::operation::{ADD, READ_ATTRIBUTE};
use keel_core::{
    AttributeDefinition, AttributeType, BootOperation, ManagementModel, OperationDefinition,
    PathAddress, PathElement, ResourceDefinition,
};

fn address(s: &str) -> PathAddress {
    s.parse().unwrap()
}

fn execute(model: &ManagementModel, operation: &BootOperation) -> keel_core::Result<serde_json::Value> {
    let registration = model
        .registration(&operation.address)
        .ok_or_else(|| RegistrationError::NoSuchRegistration(operation.address.clone()))?;
    let entry = model
        .find_operation(&operation.address, &operation.name)
        .ok_or_else(|| OperationError::UnknownOperation {
            operation: operation.name.clone(),
            address: operation.address.clone(),
        })?;
    let mut context = OperationContext::new(model, registration, &operation.address);
    entry.handler.execute(&mut context, operation)
}

fn datasources_model() -> ManagementModel {
    let model = ManagementModel::new();
    model.register_global_operations().unwrap();
    model
        .register_sub_model(
            &PathAddress::root(),
            &ResourceDefinition::new(PathElement::new("subsystem", "datasources"))
                .with_capability("keel.datasources")
                .with_child(
                    ResourceDefinition::new(PathElement::wildcard("data-source"))
                        .with_model_only_add_remove()
                        .with_attribute(
                            AttributeDefinition::new("jndi-name", AttributeType::String)
                                .required(),
                        )
                        .with_attribute(
                            AttributeDefinition::new("max-pool-size", AttributeType::Int)
                                .with_default(json!(20)),
                        ),
                ),
        )
        .unwrap();
    model
}

#[test]
fn test_subsystem_resource_starts_empty() {
    let model = datasources_model();
    let resource = model.resource(&address("subsystem=datasources")).unwrap();
    let snapshot = resource.snapshot();
    assert!(snapshot.attributes.is_empty());
    assert!(snapshot.children.is_empty());
    assert_eq!(
        model.capability_registry().provider_of("keel.datasources"),
        Some(address("subsystem=datasources"))
    );
}

#[test]
fn test_duplicate_add_keeps_first_resource() {
    let model = datasources_model();
    let target = address("subsystem=datasources/data-source=ExampleDS");

    execute(&model, &BootOperation::add(target.clone(), json!({ "jndi-name": "java:/Example" })))
        .unwrap();
    let err = execute(&model, &BootOperation::add(target.clone(), json!({ "jndi-name": "other" })))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Registration(RegistrationError::DuplicateResource(_))
    ));
    assert_eq!(
        model.resource(&target).unwrap().attribute("jndi-name"),
        Some(json!("java:/Example"))
    );
}

#[test]
fn test_unregistered_child_type_has_no_registration() {
    let model = datasources_model();
    assert!(model
        .registration(&address("subsystem=datasources/xa-data-source=X"))
        .is_none());
    assert!(model
        .find_operation(&address("subsystem=datasources/xa-data-source=X"), ADD)
        .is_none());
}

#[test]
fn test_local_operation_overrides_inherited() {
    struct Constant;

    impl keel_core::OperationStepHandler for Constant {
        fn execute(
            &self,
            _context: &mut OperationContext<'_>,
            _operation: &BootOperation,
        ) -> keel_core::Result<serde_json::Value> {
            Ok(json!("local"))
        }
    }

    let model = datasources_model();
    let subsystem = model.registration(&address("subsystem=datasources")).unwrap();
    subsystem
        .register_operation(OperationEntry::new(
            OperationDefinition::new(READ_ATTRIBUTE).read_only(),
            Arc::new(Constant),
        ))
        .unwrap();

    let value = execute(
        &model,
        &BootOperation::read_attribute(address("subsystem=datasources"), "anything"),
    )
    .unwrap();
    assert_eq!(value, json!("local"));
}

#[test]
fn test_snapshot_and_restore_tree() {
    let model = datasources_model();
    let saved = model.snapshot_tree();

    execute(
        &model,
        &BootOperation::add(
            address("subsystem=datasources/data-source=ExampleDS"),
            json!({ "jndi-name": "java:/Example" }),
        ),
    )
    .unwrap();
    assert_ne!(model.to_model(), saved.to_model());

    model.restore_tree(saved);
    assert_eq!(model.to_model(), json!({ "subsystem": { "datasources": {} } }));
}

#[test]
fn test_concurrent_adds_of_distinct_resources() {
    let model = Arc::new(datasources_model());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let model = model.clone();
            thread::spawn(move || {
                let target = address(&format!("subsystem=datasources/data-source=ds{}", i));
                execute(
                    &model,
                    &BootOperation::add(target, json!({ "jndi-name": format!("java:/ds{}", i) })),
                )
                .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let subsystem = model.resource(&address("subsystem=datasources")).unwrap();
    assert_eq!(subsystem.child_names("data-source").len(), 8);
}

#[test]
fn test_concurrent_adds_of_same_resource_have_one_winner() {
    let model = Arc::new(datasources_model());
    let target = address("subsystem=datasources/data-source=shared");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let model = model.clone();
            let target = target.clone();
            thread::spawn(move || {
                execute(
                    &model,
                    &BootOperation::add(target, json!({ "jndi-name": "java:/shared" })),
                )
                .is_ok()
            })
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
}
