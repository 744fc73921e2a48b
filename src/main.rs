//! kvrepl - single-leader, semi-synchronous replicated key-value store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvrepl::api::HttpServer;
use kvrepl::config::NodeConfig;
use kvrepl::Result;

#[derive(Parser)]
#[command(name = "kvrepl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node. Reads NODE_TYPE, WRITE_QUORUM, MIN_DELAY, MAX_DELAY,
    /// FOLLOWERS, PORT, and REPLICATE_TIMEOUT_MS from the environment,
    /// unless --config points at a TOML file with the same fields.
    Start {
        /// Optional TOML config file, for local development.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a configuration file without starting the node.
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Query a running node's /status endpoint.
    Status {
        /// Node base URL, e.g. http://localhost:5050
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Start { config } => run_start(config).await,
        Commands::Validate { config } => run_validate(config),
        Commands::Status { address } => run_status(address).await,
    }
}

fn init_logging(level: &str) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_start(config_path: Option<PathBuf>) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration from file");
            NodeConfig::from_file(&path)?
        }
        None => NodeConfig::from_env()?,
    };

    tracing::info!(
        role = %config.role,
        listen_address = %config.listen_address,
        peers = config.peers.len(),
        write_quorum = config.write_quorum,
        "starting kvrepl node"
    );

    let server = HttpServer::new(config);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| kvrepl::Error::Internal(format!("failed to install signal handler: {e}")))?;

    tokio::select! {
        result = server.start() => result,
        _ = shutdown_rx.recv() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

fn run_validate(config_path: PathBuf) -> Result<()> {
    let config = NodeConfig::from_file(&config_path)?;
    println!(
        "OK: role={} listen_address={} peers={} write_quorum={}",
        config.role,
        config.listen_address,
        config.peers.len(),
        config.write_quorum
    );
    Ok(())
}

async fn run_status(address: String) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/status", address.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| kvrepl::Error::Network(format!("request to {url} failed: {e}")))?;

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| kvrepl::Error::Network(format!("invalid response body: {e}")))?;

    println!("{}", serde_json::to_string_pretty(&body).unwrap());
    Ok(())
}
