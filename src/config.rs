//! Node configuration.
//!
//! A node's configuration is immutable for its lifetime: role, listen
//! address, peer list, write quorum, simulated-delay bounds, and the
//! per-peer replication timeout. The recognized environment variables
//! mirror the orchestrator-facing contract; an optional TOML file may
//! supply the same fields for local development.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
}

impl Role {
    /// String form used in JSON responses (`node_type`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Follower => "follower",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "leader" => Ok(Role::Leader),
            "follower" => Ok(Role::Follower),
            other => Err(crate::Error::Config(format!(
                "NODE_TYPE must be 'leader' or 'follower', got '{other}'"
            ))),
        }
    }
}

/// Node configuration, immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// `leader` or `follower`.
    pub role: Role,

    /// Address this node's HTTP server binds to, e.g. `0.0.0.0:5050`.
    pub listen_address: String,

    /// Follower base URLs. Empty for followers.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Write quorum W. Leader only; ignored on followers.
    #[serde(default = "default_write_quorum")]
    pub write_quorum: usize,

    /// Lower bound of the simulated pre-replication delay, in milliseconds.
    #[serde(default)]
    pub min_delay_ms: u64,

    /// Upper bound of the simulated pre-replication delay, in milliseconds.
    #[serde(default)]
    pub max_delay_ms: u64,

    /// Per-peer upper bound on an outbound replication attempt.
    #[serde(default = "default_replicate_timeout_ms")]
    pub replicate_timeout_ms: u64,
}

fn default_write_quorum() -> usize {
    1
}

fn default_replicate_timeout_ms() -> u64 {
    2000
}

impl NodeConfig {
    /// Build configuration from the recognized environment variables,
    /// per the external interface contract (`NODE_TYPE`, `WRITE_QUORUM`,
    /// `MIN_DELAY`, `MAX_DELAY`, `FOLLOWERS`, `PORT`,
    /// `REPLICATE_TIMEOUT_MS`).
    pub fn from_env() -> crate::Result<Self> {
        let role: Role = std::env::var("NODE_TYPE")
            .map_err(|_| crate::Error::Config("NODE_TYPE is required".into()))?
            .parse()?;

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5050".to_string())
            .parse()
            .map_err(|_| crate::Error::Config("PORT must be an integer".into()))?;

        let peers: Vec<String> = std::env::var("FOLLOWERS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let write_quorum: usize = match std::env::var("WRITE_QUORUM") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| crate::Error::Config("WRITE_QUORUM must be an integer".into()))?,
            Err(_) if peers.is_empty() => 0,
            Err(_) => default_write_quorum(),
        };

        let min_delay_secs: f64 = parse_env_float("MIN_DELAY", 0.0)?;
        let max_delay_secs: f64 = parse_env_float("MAX_DELAY", 0.0)?;

        let replicate_timeout_ms: u64 = match std::env::var("REPLICATE_TIMEOUT_MS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| crate::Error::Config("REPLICATE_TIMEOUT_MS must be an integer".into()))?,
            Err(_) => default_replicate_timeout_ms(),
        };

        let config = Self {
            role,
            listen_address: format!("0.0.0.0:{port}"),
            peers,
            write_quorum,
            min_delay_ms: (min_delay_secs * 1000.0).round() as u64,
            max_delay_ms: (max_delay_secs * 1000.0).round() as u64,
            replicate_timeout_ms,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, for local development.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the invariants from the data model: `min_delay_ms <=
    /// max_delay_ms`, and (for a leader with peers) `write_quorum` in
    /// `[1, peers.len()]`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(crate::Error::Config(format!(
                "min_delay_ms ({}) must be <= max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }

        if self.role == Role::Leader && !self.peers.is_empty() {
            if self.write_quorum == 0 || self.write_quorum > self.peers.len() {
                return Err(crate::Error::Config(format!(
                    "write_quorum ({}) must be in [1, {}]",
                    self.write_quorum,
                    self.peers.len()
                )));
            }
        }

        Ok(())
    }

    pub fn replicate_timeout(&self) -> Duration {
        Duration::from_millis(self.replicate_timeout_ms)
    }
}

fn parse_env_float(key: &str, default: f64) -> crate::Result<f64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| crate::Error::Config(format!("{key} must be a number"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("leader".parse::<Role>().unwrap(), Role::Leader);
        assert_eq!("Follower".parse::<Role>().unwrap(), Role::Follower);
        assert!("bogus".parse::<Role>().is_err());
    }

    #[test]
    fn validate_rejects_inverted_delay_bounds() {
        let config = NodeConfig {
            role: Role::Leader,
            listen_address: "0.0.0.0:5050".into(),
            peers: vec!["http://localhost:5001".into()],
            write_quorum: 1,
            min_delay_ms: 100,
            max_delay_ms: 10,
            replicate_timeout_ms: 2000,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_quorum() {
        let config = NodeConfig {
            role: Role::Leader,
            listen_address: "0.0.0.0:5050".into(),
            peers: vec!["http://localhost:5001".into(), "http://localhost:5002".into()],
            write_quorum: 3,
            min_delay_ms: 0,
            max_delay_ms: 0,
            replicate_timeout_ms: 2000,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_follower_without_quorum_bounds() {
        let config = NodeConfig {
            role: Role::Follower,
            listen_address: "0.0.0.0:5001".into(),
            peers: vec![],
            write_quorum: 0,
            min_delay_ms: 0,
            max_delay_ms: 0,
            replicate_timeout_ms: 2000,
        };
        assert!(config.validate().is_ok());
    }
}
