//! FireBridge - Fire TV remote-control bridge
//!
//! Pairs with a Fire TV over its local REST API and sends remote-control
//! commands to it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use firebridge_auth::{JsonTokenStorage, TokenStore};
use firebridge_core::{BridgeConfig, DeviceEndpoint};
use firebridge_session::Session;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// FireBridge - control a Fire TV from the command line
#[derive(Parser, Debug)]
#[command(name = "firebridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Token storage file (default: ~/.config/firebridge/devices.json)
    #[arg(long, env = "FIREBRIDGE_STORAGE")]
    storage: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Skip the DIAL wake-up before pairing
    #[arg(long)]
    no_wake: bool,

    /// Wake the device before a command after this many idle seconds
    #[arg(long)]
    idle_wake: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pair with a device: it shows a PIN, type it in here
    Pair {
        /// Device address, `host`, `host:port` or `[ipv6]:port`
        device: DeviceEndpoint,
    },
    /// Send one or more commands to a paired device
    Send {
        device: DeviceEndpoint,
        /// Command identifiers, e.g. HOME or custom_app:com.netflix.ninja
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Check that a device's control API answers
    Check { device: DeviceEndpoint },
    /// Send a DIAL wake-up
    Wake { device: DeviceEndpoint },
    /// Drop the stored token of a device
    Forget { device: DeviceEndpoint },
    /// List configured devices
    Devices,
    /// List supported command identifiers
    Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = BridgeConfig::new()
        .with_request_timeout(Duration::from_millis(args.timeout_ms))
        .with_wake_before_pairing(!args.no_wake)
        .with_idle_wake_after(args.idle_wake.map(Duration::from_secs));

    let storage = match &args.storage {
        Some(path) => JsonTokenStorage::with_path(path.clone()).await,
        None => JsonTokenStorage::new().await,
    }
    .context("Failed to open token storage")?;
    let storage = Arc::new(storage);

    match args.command {
        Command::Pair { device } => pair(device, storage, config).await,
        Command::Send { device, commands } => {
            let session = Session::open(device, storage, config).await?;
            let mut failed = 0;
            for identifier in &commands {
                match session.send_command(identifier).await {
                    Ok(()) => info!("{} sent", identifier),
                    Err(e) => {
                        error!("{}: {}", identifier, e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} commands failed", failed, commands.len());
            }
            Ok(())
        }
        Command::Check { device } => {
            let session = Session::new(storage, config);
            session.check_reachable(&device).await?;
            println!("{} is reachable", device);
            Ok(())
        }
        Command::Wake { device } => {
            let session = Session::open(device.clone(), storage, config).await?;
            if session.wake().await? {
                info!("Wake-up sent to {}", device);
            } else {
                info!("{} did not accept the wake-up, it may already be awake", device);
            }
            Ok(())
        }
        Command::Forget { device } => {
            let session = Session::open(device.clone(), storage, config).await?;
            session.forget().await?;
            info!("Forgot token of {}", device);
            Ok(())
        }
        Command::Devices => {
            let mut devices = storage.list().await?;
            devices.sort_by(|a, b| a.identifier.cmp(&b.identifier));
            if devices.is_empty() {
                println!("No configured devices");
            }
            for record in devices {
                let status = if record.token.is_some() { "paired" } else { "unpaired" };
                println!("{}  {}  {}", record.endpoint, record.name, status);
            }
            Ok(())
        }
        Command::Commands => {
            let session = Session::new(storage, config);
            for identifier in session.translator().identifiers() {
                println!("{}", identifier);
            }
            println!("custom_app:<package>");
            Ok(())
        }
    }
}

async fn pair(device: DeviceEndpoint, storage: Arc<JsonTokenStorage>, config: BridgeConfig) -> Result<()> {
    let session = Session::new(storage, config);

    if let Err(e) = session.check_reachable(&device).await {
        if !e.is_transient() {
            return Err(e.into());
        }
        // A sleeping device may only answer after the wake-up below
        info!("{} not answering yet, continuing with wake-up", device);
    }

    info!("Requesting PIN from {}...", device);
    let pairing = session.authenticate(device.clone()).await?;

    println!(
        "Enter the PIN shown on the TV ({}s remaining):",
        pairing.remaining_seconds()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            session.cancel_pairing().await;
            anyhow::bail!("No PIN entered");
        };

        match session.complete_authentication(line.trim()).await {
            Ok(()) => {
                info!("Paired with {}", device);
                return Ok(());
            }
            Err(e) if e.requires_pairing() && !pairing.is_expired() => {
                println!("{}, try again:", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
}
