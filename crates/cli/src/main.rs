//! Vivero CLI - Database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! vivero-cli migrate
//!
//! # Upsert categories and products from YAML
//! vivero-cli seed catalog crates/cli/seeds/catalog.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed catalog` - Seed the catalog from a YAML file

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vivero-cli")]
#[command(author, version, about = "Vivero CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed data from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert categories and products from a YAML file
    Catalog {
        /// Path to the catalog YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
    }
    Ok(())
}
