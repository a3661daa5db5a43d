//! Network statistics and observability types.
//!
//! [`NetworkStats`] provides a point-in-time snapshot of the network state.
//! Obtain one via [`Network::stats`](crate::network::Network::stats).

use crate::{connection::ConnectionId, host::HostId, measure::Bandwidth};

/// Counters a router keeps over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterCounters {
    /// Messages created at this host.
    pub created: u64,
    /// Messages fully received from a neighbour.
    pub received: u64,
    /// Messages fully sent to a neighbour.
    pub sent: u64,
    /// Incoming transfers interrupted by the loss of the contact.
    pub aborted: u64,
    /// Messages refused at admission.
    pub refused: u64,
    /// Messages dropped to make room for others.
    pub evicted: u64,
    /// Messages dropped because their time to live elapsed.
    pub expired: u64,
    /// Messages that reached this host as a final recipient for the first time.
    pub delivered: u64,
}

/// Snapshot of statistics for a single host.
#[derive(Debug, Clone)]
pub struct HostStats {
    /// The host's identifier.
    pub id: HostId,
    /// Number of messages in the buffer.
    pub buffered: usize,
    /// Bytes currently occupying the buffer.
    pub buffer_used: u64,
    /// Maximum capacity of the buffer.
    pub buffer_capacity: u64,
    /// Remaining energy as a fraction of the initial energy.
    pub energy_ratio: f64,
    /// The router uses its rescue mode chooser.
    pub rescue_mode: bool,
    /// Number of contacts currently up.
    pub connections: usize,
    pub counters: RouterCounters,
}

/// Snapshot of statistics for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// The connection identifier (unordered pair of host IDs).
    pub id: ConnectionId,
    /// Configured bandwidth of this connection.
    pub bandwidth: Bandwidth,
    /// A message is currently in flight.
    pub transferring: bool,
    /// Bytes that went through the connection, including the in-flight progress.
    pub bytes_transferred: u64,
}

/// Transfer counters of the whole network, including the connections
/// that are down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounters {
    pub started: u64,
    pub done: u64,
    pub aborted: u64,
    /// Bytes credited by finished and aborted transfers.
    pub bytes: u64,
}

/// Point-in-time snapshot of the entire network state.
#[derive(Debug, Clone)]
pub struct NetworkStats {
    /// Per-host statistics.
    pub hosts: Vec<HostStats>,
    /// Per-connection statistics.
    pub connections: Vec<ConnectionStats>,
    pub transfers: TransferCounters,
}
