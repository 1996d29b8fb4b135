//! Extension booted by the `boot` command.
//!
//! Registers `subsystem=demo` with a `greeting` attribute and `item=*`
//! children, and one deployment processor.

use anyhow::Result;

use keel_core::model::{AttributeDefinition, AttributeType, ResourceDefinition};
use keel_core::types::PathElement;
use keel_core::utils::ModelVersion;
use keel_runtime::deployment::Phase;
use keel_runtime::extension::{Extension, ExtensionContext};

pub const SUBSYSTEM_NAME: &str = "demo";

pub struct DemoExtension;

impl Extension for DemoExtension {
    fn name(&self) -> &str {
        "keel-demo"
    }

    fn initialize(&self, context: &mut ExtensionContext<'_>) -> Result<()> {
        let subsystem = context.register_subsystem(SUBSYSTEM_NAME, ModelVersion::new(1, 0, 0))?;
        subsystem.register_subsystem_model(
            ResourceDefinition::new(PathElement::wildcard(SUBSYSTEM_NAME))
                .with_description("Demonstration subsystem")
                .with_model_only_add_remove()
                .with_attribute(
                    AttributeDefinition::new("greeting", AttributeType::String)
                        .with_default(serde_json::json!("hello")),
                )
                .with_child(
                    ResourceDefinition::new(PathElement::wildcard("item"))
                        .with_model_only_add_remove()
                        .with_attribute(
                            AttributeDefinition::new("value", AttributeType::String).required(),
                        ),
                ),
        )?;
        subsystem.register_transformers(&[ModelVersion::new(1, 0, 0)]);
        context.register_deployment_processor(SUBSYSTEM_NAME, Phase::Install, 100, "demo-install");
        Ok(())
    }
}
