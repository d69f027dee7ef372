//! Q-Mart CLI - Database migrations and payment support tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! qmart-cli migrate
//!
//! # Compute the gateway signature for an order/payment pair
//! qmart-cli signature sign --order-ref order_Nx1 --payment-ref pay_Nx1
//!
//! # Check a signature reported by a customer or the gateway dashboard
//! qmart-cli signature verify --order-ref order_Nx1 --payment-ref pay_Nx1 --signature 5f0c...
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `signature sign` - Print the expected signature (uses `RAZORPAY_KEY_SECRET`)
//! - `signature verify` - Print `valid` or `invalid`; exits with 1 when invalid

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qmart-cli")]
#[command(author, version, about = "Q-Mart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Compute or check gateway payment signatures
    Signature {
        #[command(subcommand)]
        action: SignatureAction,
    },
}

#[derive(Subcommand)]
enum SignatureAction {
    /// Print the signature the gateway should send for this payment
    Sign {
        /// Gateway order reference (`razorpay_order_id`)
        #[arg(long)]
        order_ref: String,

        /// Gateway payment reference (`razorpay_payment_id`)
        #[arg(long)]
        payment_ref: String,
    },
    /// Check a signature against the configured secret
    Verify {
        #[arg(long)]
        order_ref: String,

        #[arg(long)]
        payment_ref: String,

        /// Hex signature to check
        #[arg(long)]
        signature: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Command failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but its check did not pass.
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => {
            commands::migrate::storefront().await?;
            Ok(true)
        }
        Commands::Signature { action } => match action {
            SignatureAction::Sign {
                order_ref,
                payment_ref,
            } => {
                commands::signature::sign(&order_ref, &payment_ref)?;
                Ok(true)
            }
            SignatureAction::Verify {
                order_ref,
                payment_ref,
                signature,
            } => Ok(commands::signature::verify(
                &order_ref,
                &payment_ref,
                &signature,
            )?),
        },
    }
}
