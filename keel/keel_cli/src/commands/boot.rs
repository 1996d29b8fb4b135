//! The `boot` command

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::info;

use keel_core::utils::LogLevel;
use keel_runtime::system::BootConfig;
use keel_runtime::Runtime;

use crate::demo::DemoExtension;

/// Arguments for the boot command
#[derive(Args)]
pub struct BootArgs {
    /// Path to the boot configuration (JSON)
    #[clap(long)]
    pub config: String,

    /// Log level; overrides the configuration
    #[clap(long)]
    pub log_level: Option<String>,

    /// Print the boot report instead of the model
    #[clap(long)]
    pub report: bool,
}

/// Boot the configuration and print the resulting model as JSON
pub async fn execute(args: &BootArgs) -> Result<()> {
    let flag = args
        .log_level
        .as_deref()
        .map(|level| {
            level
                .parse::<LogLevel>()
                .map_err(|_| anyhow!("Unknown log level: {}", level))
        })
        .transpose()?;

    let config = BootConfig::load(Some(args.config.as_str()))
        .await
        .with_context(|| format!("Failed to load configuration {}", args.config))?;
    super::init_logging(Some(flag.unwrap_or(config.log_level)));

    let mut runtime = Runtime::from_config(config, Arc::new(DemoExtension))?;
    let report = runtime.boot().context("Boot failed")?;
    info!(boot_id = %report.boot_id, "Booted");

    let output = if args.report {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string_pretty(&runtime.controller()?.read_model())?
    };
    println!("{}", output);
    Ok(())
}
