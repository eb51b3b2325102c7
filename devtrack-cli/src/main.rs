//! Devtrack CLI
//!
//! Command-line client for the devtrack contractor API.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the password can also come from DEVTRACK_PASSWORD)
//! devtrack login --email crew@example.com --password hunter2
//!
//! # List assigned devices
//! devtrack devices --status Installed --page-size 50
//!
//! # Move a device to a new status
//! devtrack set-status SN-001 Activated
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use devtrack_core::{DeviceQuery, DevtrackClient, UpdateDeviceStatusRequest, load_config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod output;

use output::Format;

#[derive(Parser)]
#[command(name = "devtrack")]
#[command(about = "Contractor client for the devtrack device tracking API")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to client.toml in the config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "DEVTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the stored session
    Status,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// List devices assigned to you
    Devices {
        /// Page number
        #[arg(long)]
        page: Option<u32>,

        /// Devices per page
        #[arg(long, default_value_t = 20)]
        page_size: u32,

        /// Only devices in this status
        #[arg(long)]
        status: Option<String>,

        /// Free-text search
        #[arg(long)]
        search: Option<String>,
    },

    /// Show the status of one device
    Device {
        /// Device serial number
        serial: String,
    },

    /// Move a device to a new status
    SetStatus {
        /// Device serial number
        serial: String,

        /// New status (e.g., Installed, Activated)
        status: String,
    },

    /// Show your contractor profile
    Me,

    /// Show device counts for a contractor
    Dashboard {
        /// Contractor id (defaults to your own)
        contractor_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.log_level);
    debug!("Loaded configuration from {:?}", config.config_path);

    let client = DevtrackClient::from_config(&config)?;
    client
        .auth()
        .on_unauthorized(|| eprintln!("Session expired, please log in again."));

    let format = if cli.json { Format::Json } else { Format::Text };

    match cli.command {
        Commands::Login { email, password } => {
            let response = client.auth().login(&email, &password).await?;
            output::login(format, &email, &response)
        }
        Commands::Logout => {
            client.auth().logout().await;
            output::logged_out(format)
        }
        Commands::Status => {
            let authenticated = client.auth().is_authenticated().await;
            let claims = client.auth().current_claims().await;
            output::status(format, authenticated, claims.as_ref())
        }
        Commands::Refresh => {
            let tokens = client.auth().refresh().await?;
            output::refreshed(format, tokens.refresh_token.is_some())
        }
        Commands::Devices {
            page,
            page_size,
            status,
            search,
        } => {
            let query = DeviceQuery {
                page,
                status,
                search,
                ..DeviceQuery::page_size(page_size)
            };
            let devices = client.contractors().devices(&query).await?;
            output::devices(format, &devices)
        }
        Commands::Device { serial } => {
            let device = client.contractors().device_by_serial(&serial).await?;
            output::device_status(format, &device)
        }
        Commands::SetStatus { serial, status } => {
            let request = UpdateDeviceStatusRequest {
                serial_number: serial,
                new_status: status,
            };
            let response = client.contractors().update_device_status(&request).await?;
            output::status_update(format, &request, &response)
        }
        Commands::Me => {
            let contractor = client.contractors().current_contractor().await?;
            output::contractor(format, &contractor)
        }
        Commands::Dashboard { contractor_id } => {
            let contractor_id = match contractor_id {
                Some(id) => id,
                None => own_contractor_id(&client).await?,
            };
            let dashboard = client.contractors().dashboard(&contractor_id).await?;
            output::dashboard(format, &contractor_id, &dashboard)
        }
    }
}

/// Contractor id from the token claims, falling back to the profile.
async fn own_contractor_id(client: &DevtrackClient) -> Result<String> {
    if let Some(id) = client
        .auth()
        .current_claims()
        .await
        .and_then(|claims| claims.contractor_id)
    {
        return Ok(id);
    }

    let contractor = client.contractors().current_contractor().await?;
    Ok(contractor.contractor_id.to_string())
}
