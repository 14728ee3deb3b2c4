/*!
 * Bluetooth Broker Daemon
 * BlueZ adapter and device control over HTTP
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use btbroker_daemon::api::{self, AppState};
use btbroker_daemon::bluetooth::{BluetoothManager, BluetoothService, BluezBus};
use btbroker_daemon::config::DaemonConfig;
use btbroker_daemon::tokens::TokenStore;

#[derive(Parser)]
#[command(name = "btbrokerd")]
#[command(about = "Bluetooth Broker Daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/btbroker/btbrokerd.toml")]
    config: String,

    /// HTTP port, overriding the one in `listen_addr`
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Run,
    /// Manage API tokens offline
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Add a username/token pair
    Add { username: String, token: String },
    /// List known usernames
    List,
    /// Remove a username
    Remove { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "btbroker_daemon={},btbrokerd={},tower_http={}",
            log_level, log_level, log_level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = DaemonConfig::load(&cli.config)?.with_port(cli.port);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await,
        Commands::Token { action } => manage_tokens(&config, action),
    }
}

async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("Bluetooth broker starting...");

    let tokens = TokenStore::open(&config.storage.path).with_context(|| {
        format!(
            "failed to open token store at {}",
            config.storage.path.display()
        )
    })?;

    let bus = BluezBus::connect(config.bluetooth.call_timeout())
        .context("failed to connect to the system bus")?;
    let manager = Arc::new(BluetoothManager::new(bus));
    log_adapters(&*manager).await;

    let state = AppState::new(manager.clone(), tokens);
    let app = api::router(state, &config.http);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("Bluetooth broker ready on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(manager) {
        Ok(manager) => manager.into_bus().close(),
        Err(_) => warn!("Bluetooth manager still in use at shutdown, leaving D-Bus connection open"),
    }
    info!("Bluetooth broker stopped");
    Ok(())
}

async fn log_adapters(bluetooth: &dyn BluetoothService) {
    match bluetooth.adapters().await {
        Ok(adapters) if adapters.is_empty() => warn!("No Bluetooth adapters found"),
        Ok(adapters) => {
            info!("Bluetooth adapters detected:");
            for a in adapters {
                info!(
                    "- Name: {}, Address: {}, Powered: {}, Discoverable: {}, Discovering: {}",
                    a.name, a.address, a.powered, a.discoverable, a.discovering
                );
            }
        }
        Err(e) => warn!("Could not list Bluetooth adapters: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn manage_tokens(config: &DaemonConfig, action: TokenAction) -> Result<()> {
    let store = TokenStore::open(&config.storage.path).with_context(|| {
        format!(
            "failed to open token store at {}",
            config.storage.path.display()
        )
    })?;

    match action {
        TokenAction::Add { username, token } => {
            store.create(&username, &token)?;
            println!("Token created for {}", username);
        }
        TokenAction::List => {
            for token in store.list()? {
                println!("{}\t{}", token.username, token.created_at.to_rfc3339());
            }
        }
        TokenAction::Remove { username } => {
            store.delete(&username)?;
            println!("Token removed for {}", username);
        }
    }
    Ok(())
}
