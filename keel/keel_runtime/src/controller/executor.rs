//! Operation execution.
//!
//! The `ModelController` resolves each operation through the registration
//! tree, checks it against the running mode and runs its handler. Writes
//! are serialized by a controller-level lock; reads take no controller lock
//! and rely on per-resource locks for consistent snapshots.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use keel_core::error::{Error, OperationError, Result};
use keel_core::model::{
    CommitAction, ManagementModel, OperationContext, OperationEntry, RollbackAction,
};
use keel_core::types::{BootOperation, ModelValue, PathAddress};
use keel_core::OperationId;

use crate::system::mode::RunningModeControl;

/// What happened to one operation of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "kebab-case")]
pub enum OperationStatus {
    /// The operation ran and its effects were kept
    Success(ModelValue),

    /// The running mode did not permit the operation; it was skipped
    Rejected(String),

    /// The operation failed; the rest of the batch continued
    Failed(String),

    /// The operation ran but the batch was rolled back
    RolledBack,
}

/// Result of one operation of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    /// Operation identifier
    pub id: OperationId,

    /// Operation name
    pub name: String,

    /// Target address
    pub address: PathAddress,

    /// What happened
    pub status: OperationStatus,
}

/// Result of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Per-operation results, in batch order. Operations after a
    /// rolling-back failure are not listed.
    pub outcomes: Vec<OperationOutcome>,

    /// The failure that rolled the batch back, if any
    pub failure: Option<Error>,
}

impl BatchOutcome {
    /// Whether the batch was rolled back.
    pub fn is_rolled_back(&self) -> bool {
        self.failure.is_some()
    }

    fn count(&self, matches: impl Fn(&OperationStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches(&outcome.status))
            .count()
    }

    /// Number of operations whose effects were kept.
    pub fn succeeded(&self) -> usize {
        self.count(|status| matches!(status, OperationStatus::Success(_)))
    }

    /// Number of operations skipped by the running mode.
    pub fn rejected(&self) -> usize {
        self.count(|status| matches!(status, OperationStatus::Rejected(_)))
    }

    /// Number of operations that failed without rolling back the batch.
    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, OperationStatus::Failed(_)))
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            Some(failure) => write!(f, "rolled back: {}", failure),
            None => write!(
                f,
                "{} succeeded, {} rejected, {} failed",
                self.succeeded(),
                self.rejected(),
                self.failed()
            ),
        }
    }
}

struct Step {
    value: ModelValue,
    rollback_actions: Vec<RollbackAction>,
    commit_actions: Vec<CommitAction>,
}

/// Executes management operations against a model.
pub struct ModelController {
    model: Arc<ManagementModel>,
    running_mode: Arc<RunningModeControl>,
    write_lock: Mutex<()>,
}

impl ModelController {
    /// Create a controller over `model`.
    pub fn new(model: Arc<ManagementModel>, running_mode: Arc<RunningModeControl>) -> Self {
        Self {
            model,
            running_mode,
            write_lock: Mutex::new(()),
        }
    }

    /// The model operated on.
    pub fn model(&self) -> &Arc<ManagementModel> {
        &self.model
    }

    /// The running mode control consulted for every operation.
    pub fn running_mode(&self) -> &Arc<RunningModeControl> {
        &self.running_mode
    }

    /// Render the whole resource tree.
    pub fn read_model(&self) -> ModelValue {
        self.model.to_model()
    }

    fn resolve(&self, operation: &BootOperation) -> Result<OperationEntry> {
        let entry = self
            .model
            .find_operation(&operation.address, &operation.name)
            .ok_or_else(|| OperationError::UnknownOperation {
                operation: operation.name.clone(),
                address: operation.address.clone(),
            })?;
        self.running_mode
            .check_permitted(&entry.definition, &operation.address)?;
        Ok(entry)
    }

    /// Run one resolved operation. On failure its own rollback actions have
    /// already run and its commit actions are discarded.
    fn step(&self, entry: &OperationEntry, operation: &BootOperation) -> Result<Step> {
        let registration = self
            .model
            .registration(&operation.address)
            .ok_or_else(|| OperationError::NoSuchResource(operation.address.clone()))?;
        let mut context = OperationContext::new(&self.model, registration, &operation.address);

        match entry.handler.execute(&mut context, operation) {
            Ok(value) => Ok(Step {
                value,
                rollback_actions: context.take_rollback_actions(),
                commit_actions: context.take_commit_actions(),
            }),
            Err(e) => {
                for action in context.take_rollback_actions().into_iter().rev() {
                    action();
                }
                Err(e)
            }
        }
    }

    /// Execute a single operation.
    pub fn execute(&self, operation: &BootOperation) -> Result<ModelValue> {
        let entry = self.resolve(operation)?;
        debug!(
            operation = %operation.name,
            address = %operation.address,
            id = %operation.id,
            "Executing operation"
        );

        if entry.definition.read_only {
            return self.step(&entry, operation).map(|step| step.value);
        }

        let _guard = self.write_lock.lock();
        let step = self.step(&entry, operation)?;
        self.commit(step.commit_actions);
        Ok(step.value)
    }

    fn commit(&self, actions: Vec<CommitAction>) {
        for action in actions {
            action(self.model.as_ref());
        }
    }

    /// Execute operations in order as one batch.
    ///
    /// Operations the running mode rejects are reported and skipped. A
    /// failing operation rolls back the whole batch when `rollback_on_failure`
    /// or the operation's own flag is set; otherwise it is reported and the
    /// batch continues.
    pub fn execute_batch(
        &self,
        operations: &[BootOperation],
        rollback_on_failure: bool,
    ) -> BatchOutcome {
        let _guard = self.write_lock.lock();
        let saved = self.model.snapshot_tree();
        let mut rollback_actions: Vec<RollbackAction> = Vec::new();
        let mut commit_actions: Vec<CommitAction> = Vec::new();
        let mut outcomes: Vec<OperationOutcome> = Vec::with_capacity(operations.len());

        for operation in operations {
            let result = self
                .resolve(operation)
                .and_then(|entry| self.step(&entry, operation));

            let status = match result {
                Ok(step) => {
                    rollback_actions.extend(step.rollback_actions);
                    commit_actions.extend(step.commit_actions);
                    OperationStatus::Success(step.value)
                }
                Err(e @ Error::Operation(OperationError::Rejected { .. })) => {
                    warn!(
                        operation = %operation.name,
                        address = %operation.address,
                        "Operation rejected: {}", e
                    );
                    OperationStatus::Rejected(e.to_string())
                }
                Err(e) if rollback_on_failure || operation.rollback_on_failure => {
                    error!(
                        operation = %operation.name,
                        address = %operation.address,
                        "Operation failed, rolling back batch: {}", e
                    );
                    self.model.restore_tree(saved);
                    for action in rollback_actions.into_iter().rev() {
                        action();
                    }
                    for outcome in &mut outcomes {
                        if matches!(outcome.status, OperationStatus::Success(_)) {
                            outcome.status = OperationStatus::RolledBack;
                        }
                    }
                    outcomes.push(OperationOutcome {
                        id: operation.id,
                        name: operation.name.clone(),
                        address: operation.address.clone(),
                        status: OperationStatus::Failed(e.to_string()),
                    });
                    return BatchOutcome {
                        outcomes,
                        failure: Some(e),
                    };
                }
                Err(e) => {
                    warn!(
                        operation = %operation.name,
                        address = %operation.address,
                        "Operation failed: {}", e
                    );
                    OperationStatus::Failed(e.to_string())
                }
            };

            outcomes.push(OperationOutcome {
                id: operation.id,
                name: operation.name.clone(),
                address: operation.address.clone(),
                status,
            });
        }

        self.commit(commit_actions);
        let outcome = BatchOutcome {
            outcomes,
            failure: None,
        };
        info!(operations = operations.len(), "Batch complete: {}", outcome);
        outcome
    }
}

impl fmt::Debug for ModelController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelController")
            .field("running_mode", &self.running_mode.running_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentRepository;
    use crate::deployment::deployment_definition;
    use keel_core::model::{AttributeDefinition, AttributeType, ResourceDefinition};
    use keel_core::traits::ContentRepository;
    use keel_core::types::operation::READ_RESOURCE;
    use keel_core::types::{PathElement, ReferenceToken, RunningMode};
    use serde_json::json;

    fn controller(mode: RunningMode) -> ModelController {
        let model = ManagementModel::new();
        model.register_global_operations().unwrap();
        model
            .register_sub_model(
                &PathAddress::root(),
                &ResourceDefinition::new(PathElement::wildcard("system-property"))
                    .with_model_only_add_remove()
                    .with_attribute(
                        AttributeDefinition::new("value", AttributeType::String).required(),
                    ),
            )
            .unwrap();
        ModelController::new(Arc::new(model), Arc::new(RunningModeControl::new(mode)))
    }

    fn property(name: &str, value: &str) -> BootOperation {
        BootOperation::add(
            format!("system-property={}", name).parse().unwrap(),
            json!({ "value": value }),
        )
    }

    #[test]
    fn test_execute_unknown_operation() {
        let controller = controller(RunningMode::Normal);
        let err = controller
            .execute(&BootOperation::new("explode", PathAddress::root()))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Operation(OperationError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_batch_without_rollback_continues_after_failure() {
        let controller = controller(RunningMode::Normal);
        let outcome = controller.execute_batch(
            &[property("a", "1"), property("a", "again"), property("b", "2")],
            false,
        );

        assert!(!outcome.is_rolled_back());
        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(
            controller.read_model(),
            json!({ "system-property": { "a": { "value": "1" }, "b": { "value": "2" } } })
        );
    }

    #[test]
    fn test_batch_rollback_restores_tree() {
        let controller = controller(RunningMode::Normal);
        controller.execute(&property("kept", "0")).unwrap();
        let before = controller.read_model();

        let outcome = controller.execute_batch(
            &[property("a", "1"), property("b", "2"), property("a", "again")],
            true,
        );

        assert!(outcome.is_rolled_back());
        assert_eq!(outcome.outcomes.len(), 3);
        assert_eq!(outcome.outcomes[0].status, OperationStatus::RolledBack);
        assert!(matches!(outcome.outcomes[2].status, OperationStatus::Failed(_)));
        assert_eq!(controller.read_model(), before);
    }

    #[test]
    fn test_operation_flag_rolls_back_batch() {
        let controller = controller(RunningMode::Normal);
        let outcome = controller.execute_batch(
            &[
                property("a", "1"),
                property("a", "again").rolling_back_on_failure(),
                property("b", "2"),
            ],
            false,
        );

        assert!(outcome.is_rolled_back());
        assert_eq!(outcome.outcomes.len(), 2);
        assert_eq!(controller.read_model(), json!({}));
    }

    #[test]
    fn test_rejected_operations_do_not_abort_batch() {
        let controller = controller(RunningMode::Suspended);
        let outcome = controller.execute_batch(
            &[
                property("a", "1"),
                BootOperation::new(READ_RESOURCE, PathAddress::root()),
            ],
            true,
        );

        assert!(!outcome.is_rolled_back());
        assert_eq!(outcome.rejected(), 1);
        assert_eq!(outcome.succeeded(), 1);
    }

    #[test]
    fn test_concurrent_reads_during_writes() {
        let controller = Arc::new(controller(RunningMode::Normal));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let controller = controller.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        controller
                            .execute(&property(&format!("p{}-{}", i, j), "v"))
                            .unwrap();
                    }
                })
            })
            .collect();
        let reader = {
            let controller = controller.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let value = controller
                        .execute(&BootOperation::new(READ_RESOURCE, PathAddress::root()))
                        .unwrap();
                    assert!(value.is_object());
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let root = controller.model().root_resource();
        assert_eq!(root.child_names("system-property").len(), 100);
    }

    fn deployment_controller() -> (ModelController, Arc<InMemoryContentRepository>) {
        let repository = Arc::new(InMemoryContentRepository::new());
        let model = ManagementModel::new();
        model.register_global_operations().unwrap();
        model
            .register_sub_model(&PathAddress::root(), &deployment_definition(repository.clone()))
            .unwrap();
        let controller = ModelController::new(
            Arc::new(model),
            Arc::new(RunningModeControl::new(RunningMode::Normal)),
        );
        (controller, repository)
    }

    fn app() -> PathAddress {
        "deployment=app.war".parse().unwrap()
    }

    #[test]
    fn test_rolled_back_remove_keeps_deployment_content() {
        let (controller, repository) = deployment_controller();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        controller
            .execute(&BootOperation::add(app(), json!({ "content": hash.to_hex() })))
            .unwrap();
        let before = controller.read_model();

        let outcome = controller.execute_batch(
            &[
                BootOperation::remove(app()),
                BootOperation::new("explode", PathAddress::root()),
            ],
            true,
        );

        assert!(outcome.is_rolled_back());
        assert_eq!(controller.read_model(), before);
        assert!(repository.has_content(&hash));
        assert_eq!(
            repository.references(&hash),
            vec![ReferenceToken::new("deployment=app.war")]
        );
    }

    #[test]
    fn test_rolled_back_add_releases_reference() {
        let (controller, repository) = deployment_controller();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();

        let outcome = controller.execute_batch(
            &[
                BootOperation::add(app(), json!({ "content": hash.to_hex() })),
                BootOperation::new("explode", PathAddress::root()),
            ],
            true,
        );

        assert!(outcome.is_rolled_back());
        assert!(controller.model().resource(&app()).is_none());
        assert!(repository.references(&hash).is_empty());
    }

    #[test]
    fn test_committed_remove_and_readd_keeps_reference() {
        let (controller, repository) = deployment_controller();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        let add = BootOperation::add(app(), json!({ "content": hash.to_hex() }));
        controller.execute(&add).unwrap();

        let outcome = controller.execute_batch(&[BootOperation::remove(app()), add], true);

        assert_eq!(outcome.succeeded(), 2);
        assert!(controller.model().resource(&app()).is_some());
        assert_eq!(repository.references(&hash).len(), 1);
    }

    #[test]
    fn test_committed_remove_releases_content() {
        let (controller, repository) = deployment_controller();
        let hash = repository.add_content(&mut &b"war bytes"[..]).unwrap();
        controller
            .execute(&BootOperation::add(app(), json!({ "content": hash.to_hex() })))
            .unwrap();

        controller.execute(&BootOperation::remove(app())).unwrap();
        assert!(!repository.has_content(&hash));
    }
}
