//! m-relay CLI
//!
//! Management commands for a running hub:
//! - Instance lifecycle (create, qr, reset, disconnect)
//! - Message sending
//! - Status and listing

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m_relay::client::HubClient;
use m_relay::commands;
use m_relay::output::{format_hub_status, print_warning};

#[derive(Parser)]
#[command(name = "m-relay")]
#[command(author, version, about = "Multi-instance messaging hub CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Hub API address (host:port, overrides config)
    #[arg(short = 'H', long, global = true)]
    hub: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered instances
    List {
        /// Filter by instance ID substring
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Register a new instance
    Create {
        /// Instance identifier (generated if omitted)
        instance_id: Option<String>,
        /// Display label
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show hub status, or one instance's status
    Status {
        /// Instance identifier
        instance: Option<String>,
    },

    /// Show the pairing code for an instance
    Qr {
        /// Instance identifier
        instance: String,
        /// Poll until a code is available or the instance connects
        #[arg(short, long)]
        wait: bool,
    },

    /// Tear an instance down and re-pair it under the same ID
    Reset {
        /// Instance identifier
        instance: String,
    },

    /// Remove an instance from the hub
    Disconnect {
        /// Instance identifier
        instance: String,
    },

    /// Send a message through a connected instance
    Send {
        /// Instance identifier
        instance: String,
        /// Recipient address
        target: String,
        /// Message text
        message: String,
        /// Optional media reference
        #[arg(short, long)]
        media: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let client = match cli.hub {
        Some(address) => HubClient::with_address(address),
        None => HubClient::new(),
    };

    // Handle no command - show quick status
    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            show_quick_status(&client).await;
            return Ok(());
        }
    };

    match command {
        Commands::List { filter } => {
            commands::list_command(&client, filter.as_deref()).await?;
        }

        Commands::Create { instance_id, name } => {
            commands::create_command(&client, instance_id, name).await?;
        }

        Commands::Status { instance } => {
            commands::status_command(&client, instance.as_deref()).await?;
        }

        Commands::Qr { instance, wait } => {
            commands::qr_command(&client, &instance, wait).await?;
        }

        Commands::Reset { instance } => {
            commands::reset_command(&client, &instance).await?;
        }

        Commands::Disconnect { instance } => {
            commands::disconnect_command(&client, &instance).await?;
        }

        Commands::Send {
            instance,
            target,
            message,
            media,
        } => {
            commands::send_command(&client, &instance, &target, &message, media).await?;
        }
    }

    Ok(())
}

/// Bare `m-relay` invocation: one-line liveness summary
async fn show_quick_status(client: &HubClient) {
    match client.hub_status().await {
        Ok(status) => {
            println!("{}", format_hub_status(&status));
            println!("Run `m-relay --help` for available commands");
        }
        Err(_) => {
            print_warning("Hub is not running. Start it with: mr-hub");
        }
    }
}
