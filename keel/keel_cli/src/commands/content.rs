//! The `content` commands

use std::fs::File;

use anyhow::{Context, Result};
use clap::Subcommand;

use keel_core::traits::ContentRepository;
use keel_core::types::ContentHash;
use keel_runtime::content::FileSystemContentRepository;

/// Content repository commands
#[derive(Subcommand)]
pub enum ContentCommand {
    /// Store a file and print its digest
    Add {
        /// Repository directory
        #[clap(long)]
        store: String,

        /// File to store
        file: String,
    },

    /// Print whether content with a digest is stored
    Has {
        /// Repository directory
        #[clap(long)]
        store: String,

        /// Hex SHA-256 digest
        hash: String,
    },
}

/// Run a content command
pub fn execute(command: &ContentCommand) -> Result<()> {
    match command {
        ContentCommand::Add { store, file } => {
            let repository = FileSystemContentRepository::new(store)
                .with_context(|| format!("Failed to open repository {}", store))?;
            let mut input =
                File::open(file).with_context(|| format!("Failed to open {}", file))?;
            let hash = repository.add_content(&mut input)?;
            println!("{}", hash);
        }
        ContentCommand::Has { store, hash } => {
            let hash: ContentHash = hash
                .parse()
                .with_context(|| format!("Invalid digest: {}", hash))?;
            let repository = FileSystemContentRepository::new(store)
                .with_context(|| format!("Failed to open repository {}", store))?;
            println!("{}", repository.has_content(&hash));
        }
    }
    Ok(())
}
