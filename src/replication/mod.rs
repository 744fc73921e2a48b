//! Replication
//!
//! The leader's write-and-replicate pipeline: concurrent fan-out to
//! followers, bounded simulated network delay, quorum waiting, and latency
//! accounting. See [`leader::Replicator`].

mod leader;

pub use leader::Replicator;

/// Outcome of a single peer's replication attempt for one write.
#[derive(Debug, Clone, Copy)]
pub struct PeerOutcome {
    pub success: bool,
    pub latency_ms: f64,
}

/// Result of a quorum-gated write, returned to the `/set` caller.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// True iff `replica_count >= required`.
    pub accepted: bool,
    /// Number of peers that acknowledged before the quorum decision.
    pub replica_count: usize,
    /// The write quorum required for `accepted`.
    pub required: usize,
    /// Latencies of peers counted at the moment of return, in arrival order.
    pub per_peer_latencies_ms: Vec<f64>,
    /// Mean of `per_peer_latencies_ms`; 0.0 if empty.
    pub average_latency_ms: f64,
    /// Wall-clock time from request entry to just before response emission.
    pub total_latency_ms: f64,
}
