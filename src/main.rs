use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hearth_gateway::api::ApiServer;
use hearth_gateway::assistant::transports_from_config;
use hearth_gateway::devices::{discovery, snapshot};
use hearth_gateway::{Assistant, CloudTransport, Config, Dispatcher, Snapshot, TransportKind};

/// Hearth - Voice and text smart-home assistant gateway
#[derive(Parser)]
#[command(name = "hearth", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/hearth/config.toml)
    #[arg(short, long, env = "HEARTH_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Handle one utterance and print the reply
    Say {
        /// What to say
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List registered devices
    Devices,
    /// Query the current state of cloud devices
    State {
        /// Only this device
        device: Option<String>,
    },
    /// Save or restore device states
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Discover LAN-controllable devices
    Scan {
        /// Seconds to wait for replies (overrides config)
        #[arg(short, long)]
        wait: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Capture the current state of every cloud device
    Save {
        /// Snapshot file (defaults to the data directory)
        path: Option<PathBuf>,
    },
    /// Re-apply a saved snapshot
    Restore {
        /// Snapshot file (defaults to the data directory)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,hearth_gateway=info",
        1 => "info,hearth_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Say { text } => say(&config, &text.join(" ")).await,
        Command::Devices => {
            list_devices(&config);
            Ok(())
        }
        Command::State { device } => show_state(&config, device.as_deref()).await,
        Command::Snapshot { action } => match action {
            SnapshotAction::Save { path } => snapshot_save(&config, path).await,
            SnapshotAction::Restore { path } => snapshot_restore(&config, path).await,
        },
        Command::Scan { wait } => scan(&config, wait).await,
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(config)?);

    tracing::info!(
        port = config.server.port,
        model = %config.llm.model,
        devices = assistant.registry().len(),
        "starting hearth gateway"
    );

    let server = ApiServer::new(assistant, &config.server);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(config)?;
    let reply = assistant.handle(text).await;

    if let Some(outcome) = &reply.dispatch {
        println!("[{}] {}", reply.intent, outcome.summary());
    } else {
        println!("[{}]", reply.intent);
    }
    println!("{}: {}", config.assistant.name, reply.reply_text);
    Ok(())
}

fn list_devices(config: &Config) {
    let registry = config.registry();
    if registry.is_empty() {
        println!("No devices configured.");
        return;
    }

    for device in registry.devices() {
        let address = device
            .address
            .map_or_else(String::new, |a| format!(" @ {a}"));
        println!(
            "{:<24} {:<8} {:<6}{address}",
            device.name,
            device.sku,
            device.transport.to_string()
        );
    }
}

async fn show_state(config: &Config, only: Option<&str>) -> anyhow::Result<()> {
    let registry = config.registry();
    let cloud = CloudTransport::from_config(&config.cloud)?;

    let devices: Vec<_> = match only {
        Some(name) => vec![
            registry
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("unknown device: {name}"))?,
        ],
        None => registry.devices().iter().collect(),
    };

    for device in devices {
        if device.transport != TransportKind::Cloud {
            println!("{:<24} (LAN devices do not report state)", device.name);
            continue;
        }
        match cloud.query_state(device).await {
            Ok(state) => println!("{:<24} {}", device.name, serde_json::to_string(&state)?),
            Err(e) => println!("{:<24} error: {e}", device.name),
        }
    }
    Ok(())
}

fn snapshot_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    path.or_else(snapshot::default_snapshot_path)
        .ok_or_else(|| anyhow::anyhow!("no data directory; pass a snapshot path"))
}

async fn snapshot_save(config: &Config, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = snapshot_path(path)?;
    let cloud = CloudTransport::from_config(&config.cloud)?;

    let snapshot = Snapshot::capture(&config.registry(), &cloud).await;
    snapshot.save(&path)?;

    println!("Saved {} device(s) to {}", snapshot.devices.len(), path.display());
    Ok(())
}

async fn snapshot_restore(config: &Config, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = snapshot_path(path)?;
    let snapshot = Snapshot::load(&path)?;
    let dispatcher = Dispatcher::new(transports_from_config(config)?, config.dispatch.clone());

    let outcomes = snapshot.restore(&config.registry(), &dispatcher).await;
    for outcome in &outcomes {
        println!("{}", outcome.summary());
    }

    if outcomes.iter().all(hearth_gateway::DispatchOutcome::overall_success) {
        Ok(())
    } else {
        anyhow::bail!("some devices could not be restored")
    }
}

async fn scan(config: &Config, wait: Option<u64>) -> anyhow::Result<()> {
    let wait = wait.map_or(config.lan.scan_timeout, Duration::from_secs);
    let found = discovery::scan(config.lan.discovery_port, wait).await?;

    if found.is_empty() {
        println!("No LAN devices answered within {wait:?}.");
        return Ok(());
    }

    for device in found {
        println!("{:<16} {:<24} {}", device.ip, device.device, device.sku);
    }
    Ok(())
}
