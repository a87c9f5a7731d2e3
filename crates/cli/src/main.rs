//! Widget store CLI - database migrations and staff user management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ws-cli migrate
//!
//! # Create a staff user for the admin dashboard
//! ws-cli user create -e admin@example.com -f Admin -l User -p 'correct horse'
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(author, version, about = "Widget store CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new staff user
    Create {
        /// Email address used to log in
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        first_name: String,

        #[arg(short, long)]
        last_name: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                first_name,
                last_name,
                password,
            } => {
                commands::user::create(&email, &first_name, &last_name, &password).await?;
            }
        },
    }
    Ok(())
}
