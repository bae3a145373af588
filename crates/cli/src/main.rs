//! Bazaar CLI - migrations and operator tasks.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! bazaar-cli migrate
//!
//! # Create a user (e.g. the first merchant)
//! bazaar-cli user create -n "Asha" -e asha@example.com -p "s3cret-pass1" -r merchant
//!
//! # Settle every store for a period
//! bazaar-cli settlement run --from 2026-10-01 --to 2026-10-07
//!
//! # Record a payout
//! bazaar-cli settlement mark-paid --id 42 --reference UTR123456
//! ```
//!
//! All commands read `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar-cli")]
#[command(author, version, about = "Bazaar operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Generate and pay out settlements
    Settlement {
        #[command(subcommand)]
        action: SettlementAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (letters and digits, at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer`, `merchant`, `delivery`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SettlementAction {
    /// Settle every store with eligible orders in the period
    Run {
        /// First day (inclusive, UTC)
        #[arg(long)]
        from: NaiveDate,

        /// Last day (inclusive, UTC)
        #[arg(long)]
        to: NaiveDate,
    },
    /// Mark a pending settlement as paid
    MarkPaid {
        /// Settlement ID
        #[arg(long)]
        id: i64,

        /// Bank or payout reference
        #[arg(long)]
        reference: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::User { action } => match action {
            UserAction::Create {
                name,
                email,
                password,
                role,
            } => {
                commands::user::create(&name, &email, &password, &role).await?;
            }
        },
        Commands::Settlement { action } => match action {
            SettlementAction::Run { from, to } => commands::settlement::run(from, to).await?,
            SettlementAction::MarkPaid { id, reference } => {
                commands::settlement::mark_paid(id, &reference).await?;
            }
        },
    }
    Ok(())
}
