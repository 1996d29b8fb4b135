//! Boot sequencing
//!
//! The `BootSequencer` drives a process from an empty model to a started
//! controller in five stages. Each stage runs exactly once, in order; a
//! stage whose own work fails moves the sequencer to `Failed`, after which
//! nothing else runs.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use keel_core::error::{BootError, Error};
use keel_core::model::{
    ManagementModel, ManagementResourceRegistration, NotificationDefinition, Resource,
};
use keel_core::traits::{ConfigurationPersister, ContentRepository};
use keel_core::types::{BootOperation, PathAddress};
use keel_core::BootId;

use super::init::{AdditionalInitialization, ControllerInitializationHook, ControllerInitializer};
use super::mode::RunningModeControl;
use crate::content::InMemoryContentRepository;
use crate::controller::{ModelController, OperationOutcome, OperationValidator};
use crate::deployment::{deployment_definition, DeployerChains, DeployerRegistration};
use crate::extension::context::SUBSYSTEM;
use crate::extension::{Extension, ExtensionRegistry};

/// Notification emitted when an attribute value is written.
pub const ATTRIBUTE_VALUE_WRITTEN: &str = "attribute-value-written";
/// Notification emitted when a resource is added.
pub const RESOURCE_ADDED: &str = "resource-added";
/// Notification emitted when a resource is removed.
pub const RESOURCE_REMOVED: &str = "resource-removed";

/// Boot stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootStage {
    /// Nothing has run yet
    Created,

    /// Global operations, infrastructure definitions and hooks are done
    ControllerInitialized,

    /// Controller and extra subsystem model are registered
    ModelInitialized,

    /// The extension is initialized and boot operations are stored
    PreBooted,

    /// Boot operations are replayed and persisted
    OperationsApplied,

    /// Boot is complete and the controller is available
    PostBooted,

    /// A stage failed; the sequencer cannot continue
    Failed,
}

impl BootStage {
    fn ordinal(self) -> Option<u8> {
        match self {
            Self::Created => Some(0),
            Self::ControllerInitialized => Some(1),
            Self::ModelInitialized => Some(2),
            Self::PreBooted => Some(3),
            Self::OperationsApplied => Some(4),
            Self::PostBooted => Some(5),
            Self::Failed => None,
        }
    }
}

impl fmt::Display for BootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::ControllerInitialized => "CONTROLLER_INITIALIZED",
            Self::ModelInitialized => "MODEL_INITIALIZED",
            Self::PreBooted => "PRE_BOOTED",
            Self::OperationsApplied => "OPERATIONS_APPLIED",
            Self::PostBooted => "POST_BOOTED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Result of replaying the boot operations.
#[derive(Debug, Clone, Serialize)]
pub struct BootReport {
    /// Boot the report belongs to
    pub boot_id: BootId,

    /// Per-operation results, in replay order
    pub outcomes: Vec<OperationOutcome>,

    /// Operations whose effects were kept
    pub succeeded: usize,

    /// Operations the running mode rejected
    pub rejected: usize,

    /// Operations that failed without aborting the boot
    pub failed: usize,

    /// The running model diverges from the persisted operations and the
    /// process needs a reload to reconcile them
    pub reload_required: bool,
}

/// Staged bootstrap of one process.
pub struct BootSequencer {
    boot_id: BootId,
    stage: BootStage,

    model: Arc<ManagementModel>,
    running_mode: Arc<RunningModeControl>,
    controller: Arc<ModelController>,
    deployers: DeployerChains,

    extension: Arc<dyn Extension>,
    controller_initializer: ControllerInitializer,
    additional_init: Arc<dyn AdditionalInitialization>,
    extension_registry: Arc<ExtensionRegistry>,
    persister: Arc<dyn ConfigurationPersister>,
    operation_validator: Option<OperationValidator>,
    register_transformers: bool,

    hooks: Vec<Arc<dyn ControllerInitializationHook>>,
    content_repository: Arc<dyn ContentRepository>,
    module_name: String,
    rollback_on_failure: bool,

    boot_operations: Vec<BootOperation>,
    installed_deployers: Vec<DeployerRegistration>,
}

impl BootSequencer {
    /// Create a sequencer with an empty model.
    ///
    /// The running mode is taken from `additional_init`. Content is kept in
    /// memory unless another repository is set with
    /// [`with_content_repository`](Self::with_content_repository).
    pub fn create(
        extension: Arc<dyn Extension>,
        controller_initializer: ControllerInitializer,
        additional_init: Arc<dyn AdditionalInitialization>,
        extension_registry: Arc<ExtensionRegistry>,
        persister: Arc<dyn ConfigurationPersister>,
        operation_validator: Option<OperationValidator>,
        register_transformers: bool,
    ) -> Self {
        let model = Arc::new(ManagementModel::new());
        let running_mode = Arc::new(RunningModeControl::new(additional_init.running_mode()));
        let controller = Arc::new(ModelController::new(model.clone(), running_mode.clone()));

        Self {
            boot_id: BootId::new(),
            stage: BootStage::Created,
            model,
            running_mode,
            controller,
            deployers: DeployerChains::new(),
            extension,
            controller_initializer,
            additional_init,
            extension_registry,
            persister,
            operation_validator,
            register_transformers,
            hooks: Vec::new(),
            content_repository: Arc::new(InMemoryContentRepository::new()),
            module_name: "main".to_string(),
            rollback_on_failure: true,
            boot_operations: Vec::new(),
            installed_deployers: Vec::new(),
        }
    }

    /// Set the hooks run during controller initialization, in order.
    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn ControllerInitializationHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the content repository deployments reference.
    pub fn with_content_repository(mut self, repository: Arc<dyn ContentRepository>) -> Self {
        self.content_repository = repository;
        self
    }

    /// Set the module name the extension registers under.
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    /// Set the rollback flag `boot` passes to `pre_boot`.
    pub fn with_rollback_on_failure(mut self, rollback_on_failure: bool) -> Self {
        self.rollback_on_failure = rollback_on_failure;
        self
    }

    /// Identifier of this boot.
    pub fn boot_id(&self) -> BootId {
        self.boot_id
    }

    /// Current stage.
    pub fn stage(&self) -> BootStage {
        self.stage
    }

    /// The model being built.
    pub fn model(&self) -> &Arc<ManagementModel> {
        &self.model
    }

    /// Running mode control shared with the controller.
    pub fn running_mode_control(&self) -> &Arc<RunningModeControl> {
        &self.running_mode
    }

    /// Content repository deployments reference.
    pub fn content_repository(&self) -> &Arc<dyn ContentRepository> {
        &self.content_repository
    }

    /// Extension registry.
    pub fn extension_registry(&self) -> &Arc<ExtensionRegistry> {
        &self.extension_registry
    }

    /// Deployment processors installed by `post_boot`, in execution order.
    pub fn installed_deployers(&self) -> &[DeployerRegistration] {
        &self.installed_deployers
    }

    /// Boot operations stored by `pre_boot` and not yet dropped.
    pub fn boot_operations(&self) -> &[BootOperation] {
        &self.boot_operations
    }

    /// The controller, once boot is complete.
    pub fn controller(&self) -> Result<Arc<ModelController>> {
        if self.stage == BootStage::PostBooted {
            Ok(self.controller.clone())
        } else {
            Err(Error::from(BootError::NotStarted(self.stage.to_string())).into())
        }
    }

    fn run_stage<T>(
        &mut self,
        target: BootStage,
        work: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let (Some(current), Some(requested)) = (self.stage.ordinal(), target.ordinal()) else {
            return Err(Error::from(BootError::SequenceFailed).into());
        };
        if current >= requested {
            return Err(Error::from(BootError::StageAlreadyCompleted(target.to_string())).into());
        }
        if current + 1 != requested {
            return Err(Error::from(BootError::OutOfOrder {
                requested: target.to_string(),
                current: self.stage.to_string(),
            })
            .into());
        }

        info!(boot_id = %self.boot_id, stage = %target, "Running boot stage");
        match work(self) {
            Ok(value) => {
                self.stage = target;
                Ok(value)
            }
            Err(e) => {
                error!(boot_id = %self.boot_id, stage = %target, "Boot stage failed: {:#}", e);
                self.stage = BootStage::Failed;
                Err(e)
            }
        }
    }

    /// Register global operations and the deployment resource, then run the
    /// initialization hooks if the process is a server.
    pub fn perform_controller_initialization(&mut self) -> Result<()> {
        self.run_stage(BootStage::ControllerInitialized, |s| {
            s.model.register_global_operations()?;
            s.model.register_sub_model(
                &PathAddress::root(),
                &deployment_definition(s.content_repository.clone()),
            )?;

            let process_type = s.additional_init.process_type();
            if !process_type.is_server() {
                debug!(process_type = %process_type, "Skipping initialization hooks");
                return Ok(());
            }
            for hook in &s.hooks {
                hook.initialize(process_type, &s.model).map_err(|e| {
                    Error::from(BootError::InitializationFailure {
                        component: hook.name().to_string(),
                        reason: format!("{:#}", e),
                    })
                })?;
                info!(hook = %hook.name(), "Ran initialization hook");
            }
            Ok(())
        })
    }

    /// Register the controller and extra subsystem model.
    pub fn init_extra_model(&mut self) -> Result<()> {
        self.run_stage(BootStage::ModelInitialized, |s| s.initialize_model())
    }

    /// `init_extra_model` for callers holding the two model roots.
    ///
    /// Both roots must be this sequencer's own.
    pub fn init_extra_model_legacy(
        &mut self,
        root_resource: &Arc<Resource>,
        root_registration: &Arc<ManagementResourceRegistration>,
    ) -> Result<()> {
        self.run_stage(BootStage::ModelInitialized, |s| {
            if !Arc::ptr_eq(root_resource, s.model.root_resource())
                || !Arc::ptr_eq(root_registration, s.model.root_registration())
            {
                return Err(Error::from(BootError::InitializationFailure {
                    component: "model".to_string(),
                    reason: "roots do not belong to the sequencer's model".to_string(),
                })
                .into());
            }
            s.initialize_model()
        })
    }

    fn initialize_model(&self) -> Result<()> {
        self.model.root_resource().ensure_child_type(SUBSYSTEM);

        let root = self.model.root_registration();
        root.register_notification(NotificationDefinition::new(
            ATTRIBUTE_VALUE_WRITTEN,
            "An attribute value was written",
        ));
        root.register_notification(NotificationDefinition::new(
            RESOURCE_ADDED,
            "A resource was added",
        ));
        root.register_notification(NotificationDefinition::new(
            RESOURCE_REMOVED,
            "A resource was removed",
        ));

        self.controller_initializer.initialize_model(&self.model)?;
        self.additional_init
            .initialize_extra_subsystems_and_model(
                &self.extension_registry,
                &self.model,
                self.model.capability_registry(),
            )
            .map_err(|e| {
                Error::from(BootError::InitializationFailure {
                    component: "additional initialization".to_string(),
                    reason: format!("{:#}", e),
                })
            })?;
        Ok(())
    }

    /// Initialize the extension and store the boot operations for replay.
    pub fn pre_boot(
        &mut self,
        boot_operations: Vec<BootOperation>,
        rollback_on_failure: bool,
    ) -> Result<()> {
        self.run_stage(BootStage::PreBooted, move |s| {
            {
                let mut context = s.extension_registry.extension_context(
                    &s.module_name,
                    &s.model,
                    &s.deployers,
                    s.register_transformers,
                );
                s.extension.initialize(&mut context).map_err(|e| {
                    Error::from(BootError::InitializationFailure {
                        component: s.extension.name().to_string(),
                        reason: format!("{:#}", e),
                    })
                })?;
            }
            s.model.capability_registry().validate()?;

            info!(
                extension = %s.extension.name(),
                operations = boot_operations.len(),
                rollback_on_failure,
                "Extension initialized"
            );
            s.boot_operations = boot_operations;
            s.rollback_on_failure = rollback_on_failure;
            Ok(())
        })
    }

    /// Validate and replay the stored boot operations, then persist the
    /// resulting model.
    pub fn apply_boot_operations(&mut self) -> Result<BootReport> {
        self.run_stage(BootStage::OperationsApplied, |s| {
            if let Some(validator) = &s.operation_validator {
                validator.validate(&s.model, &s.boot_operations)?;
            }

            let mut outcome = s
                .controller
                .execute_batch(&s.boot_operations, s.rollback_on_failure);
            if let Some(failure) = outcome.failure.take() {
                return Err(failure.into());
            }

            s.persister.store(&s.model.to_model())?;

            if outcome.failed() > 0 {
                warn!(
                    failed = outcome.failed(),
                    "Boot operations failed without rollback, reload required"
                );
                s.running_mode.set_reload_required(true);
            }

            let report = BootReport {
                boot_id: s.boot_id,
                succeeded: outcome.succeeded(),
                rejected: outcome.rejected(),
                failed: outcome.failed(),
                reload_required: s.running_mode.is_reload_required(),
                outcomes: outcome.outcomes,
            };
            info!(
                succeeded = report.succeeded,
                rejected = report.rejected,
                failed = report.failed,
                reload_required = report.reload_required,
                "Boot operations applied"
            );
            Ok(report)
        })
    }

    /// Install the collected deployment processors and drop the boot
    /// operations.
    pub fn post_boot(&mut self) -> Result<()> {
        self.run_stage(BootStage::PostBooted, |s| {
            s.installed_deployers = s.deployers.take_ordered();
            s.deployers.clear();
            s.boot_operations.clear();
            info!(
                boot_id = %s.boot_id,
                deployers = s.installed_deployers.len(),
                mode = %s.running_mode.running_mode(),
                "Boot complete"
            );
            Ok(())
        })
    }

    /// Load the boot operations from the persister and run every stage.
    pub fn boot(&mut self) -> Result<BootReport> {
        let operations = self.persister.load()?;
        self.perform_controller_initialization()?;
        self.init_extra_model()?;
        self.pre_boot(operations, self.rollback_on_failure)?;
        let report = self.apply_boot_operations()?;
        self.post_boot()?;
        Ok(report)
    }
}

impl fmt::Debug for BootSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootSequencer")
            .field("boot_id", &self.boot_id)
            .field("stage", &self.stage)
            .field("extension", &self.extension.name())
            .field("module_name", &self.module_name)
            .finish()
    }
}
