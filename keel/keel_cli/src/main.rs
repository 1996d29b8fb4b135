use clap::{Parser, Subcommand};

mod commands;
mod demo;

use commands::boot::BootArgs;
use commands::content::ContentCommand;

/// Keel Command Line Interface
///
/// Boot a management model from a configuration file, or manage content in
/// a filesystem content repository.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a configuration with the demo extension and print the model
    Boot(BootArgs),

    /// Manage repository content
    #[clap(subcommand)]
    Content(ContentCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Boot(args) => commands::boot::execute(&args).await,
        Commands::Content(command) => {
            commands::init_logging(None);
            commands::content::execute(&command)
        }
    }
}
