//! Fournil CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront migrations and create the session table
//! fournil-cli migrate
//!
//! # Load categories, products and promo codes from a YAML file
//! fournil-cli seed catalog.yaml
//!
//! # Load the bundled demo catalog
//! fournil-cli seed --demo
//!
//! # Create an admin (or promote an existing account)
//! fournil-cli admin create -e chef@fournil.fr -n "Chef" -p "mot-de-passe"
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fournil-cli")]
#[command(author, version, about = "Fournil CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// YAML file with categories, products and promo codes
        #[arg(required_unless_present = "demo", conflicts_with = "demo")]
        file: Option<PathBuf>,

        /// Load the bundled demo catalog instead of a file
        #[arg(long)]
        demo: bool,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user, or promote an existing account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters), ignored when promoting
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, demo } => commands::seed::run(file.as_deref(), demo).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
            } => commands::admin::create_user(&email, &name, &password).await?,
        },
    }
    Ok(())
}
