//! The leader's fan-out to followers: simulated delay, concurrent RPCs,
//! quorum wait, and latency accounting.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::NodeConfig;
use crate::replication::{PeerOutcome, WriteResult};

#[derive(Serialize)]
struct ReplicateBody<'a> {
    key: &'a str,
    value: &'a str,
}

/// Fans a single write out to every configured peer and waits for the write
/// quorum to be met (or for all peers to settle, whichever comes first).
pub struct Replicator {
    peers: Vec<String>,
    client: reqwest::Client,
    write_quorum: usize,
    min_delay_ms: u64,
    max_delay_ms: u64,
    replicate_timeout: Duration,
}

impl Replicator {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            peers: config.peers.clone(),
            client: reqwest::Client::new(),
            write_quorum: config.write_quorum,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            replicate_timeout: config.replicate_timeout(),
        }
    }

    /// Replicate `(key, value)` to all peers. The caller must have already
    /// applied the write to the leader's local store. `request_start` is the
    /// leader's request-entry timestamp, so `WriteResult::total_latency_ms`
    /// covers local commit plus fan-out, per the data model's "measured at
    /// the leader from request entry to just before response emission".
    pub async fn replicate(&self, key: &str, value: &str, request_start: Instant) -> WriteResult {
        if self.peers.is_empty() {
            return WriteResult {
                accepted: self.write_quorum == 0,
                replica_count: 0,
                required: self.write_quorum,
                per_peer_latencies_ms: Vec::new(),
                average_latency_ms: 0.0,
                total_latency_ms: elapsed_ms(request_start),
            };
        }

        // Bounded to peers.len(): every worker sends exactly once, so a send
        // never blocks even after we stop polling the receiver below.
        let (tx, mut rx) = mpsc::channel::<PeerOutcome>(self.peers.len());

        for peer in &self.peers {
            let tx = tx.clone();
            let client = self.client.clone();
            let peer = peer.clone();
            let key = key.to_string();
            let value = value.to_string();
            let min_delay_ms = self.min_delay_ms;
            let max_delay_ms = self.max_delay_ms;
            let timeout = self.replicate_timeout;

            tokio::spawn(async move {
                let outcome = replicate_to_peer(
                    &client, &peer, &key, &value, min_delay_ms, max_delay_ms, timeout,
                )
                .await;
                // The receiver may already be gone (quorum met, leftover
                // workers still converging followers); that's fine, their
                // outcome is simply discarded.
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut replica_count = 0usize;
        let mut received = 0usize;
        let mut latencies = Vec::with_capacity(self.peers.len());

        while received < self.peers.len() && replica_count < self.write_quorum {
            match rx.recv().await {
                Some(outcome) => {
                    received += 1;
                    if outcome.success {
                        replica_count += 1;
                        latencies.push(outcome.latency_ms);
                    }
                }
                None => break,
            }
        }

        let average_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        WriteResult {
            accepted: replica_count >= self.write_quorum,
            replica_count,
            required: self.write_quorum,
            per_peer_latencies_ms: latencies,
            average_latency_ms,
            total_latency_ms: elapsed_ms(request_start),
        }
    }
}

async fn replicate_to_peer(
    client: &reqwest::Client,
    peer: &str,
    key: &str,
    value: &str,
    min_delay_ms: u64,
    max_delay_ms: u64,
    timeout: Duration,
) -> PeerOutcome {
    let delay_ms = if max_delay_ms == min_delay_ms {
        min_delay_ms
    } else {
        rand::thread_rng().gen_range(min_delay_ms..=max_delay_ms)
    };

    let measured_start = Instant::now();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let url = format!("{}/replicate", peer.trim_end_matches('/'));
    let body = ReplicateBody { key, value };

    let result = client.post(&url).timeout(timeout).json(&body).send().await;

    let success = match result {
        Ok(response) if response.status().is_success() => match response.json::<serde_json::Value>().await {
            Ok(body) => body.get("success").and_then(|v| v.as_bool()).unwrap_or(false),
            Err(_) => false,
        },
        Ok(response) => {
            tracing::debug!(peer, status = %response.status(), "replication rejected");
            false
        }
        Err(err) => {
            tracing::debug!(peer, error = %err, "replication request failed");
            false
        }
    };

    let latency_ms = elapsed_ms(measured_start);
    tracing::debug!(peer, key, success, latency_ms, "replication attempt completed");

    PeerOutcome { success, latency_ms }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
