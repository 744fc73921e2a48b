//! kvctl - a small command-line client for a running kvrepl node.

use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "kvctl")]
#[command(author, version, about = "Command-line client for kvrepl nodes", long_about = None)]
struct Cli {
    /// Target node base URL, e.g. http://localhost:5050
    #[arg(short, long, default_value = "http://localhost:5050")]
    address: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a key/value pair (leader only).
    Set { key: String, value: String },
    /// Read a key from the targeted node's local store.
    Get { key: String },
    /// Show the targeted node's health.
    Health,
    /// Show the targeted node's status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.address.trim_end_matches('/').to_string();

    let (url, body, method_is_post) = match cli.command {
        Commands::Set { key, value } => (
            format!("{base}/set"),
            Some(json!({"key": key, "value": value})),
            true,
        ),
        Commands::Get { key } => (format!("{base}/get?key={key}"), None, false),
        Commands::Health => (format!("{base}/health"), None, false),
        Commands::Status => (format!("{base}/status"), None, false),
    };

    let request = if method_is_post {
        client.post(&url).json(&body)
    } else {
        client.get(&url)
    };

    let response = request.send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(json!({}));
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
