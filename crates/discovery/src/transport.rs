//! Abstract interface over the gossip layer.
//!
//! The gossip layer owns dissemination and failure detection. Membership
//! only needs it to deliver [`GossipEvent`]s on a channel and to accept a
//! handful of requests.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::address::HostPort;
use crate::event::GossipEvent;

/// Marker trait for `GossipTransport` errors
pub trait GossipTransportError: Debug + Error + Send + Sync + 'static {}

/// Settings handed to a transport on creation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportConfig {
    /// Name this node gossips under
    pub node_name: String,
    /// Local endpoint to bind
    pub bind: HostPort,
    /// Endpoint peers should use to reach this node
    pub advertise: HostPort,
    /// Tags gossiped for this node
    pub tags: HashMap<String, String>,
}

/// A gossip transport producing membership events.
#[async_trait]
pub trait GossipTransport: Sized + Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: GossipTransportError;

    /// Implementation specific options (network handle, keys, timers).
    type Options: Clone + Send + Sync + 'static;

    /// Create and start the transport.
    ///
    /// Events are pushed to `events` until [`GossipTransport::shutdown`].
    /// The transport must report the local node with a join event once it
    /// is running.
    async fn create(
        options: Self::Options,
        config: TransportConfig,
        events: mpsc::Sender<GossipEvent>,
    ) -> Result<Self, Self::Error>;

    /// Join an existing cluster through `seeds`.
    ///
    /// Returns the number of seeds successfully contacted. When `ignore_old`
    /// is false the cluster's event history is replayed to this node.
    async fn join(&self, seeds: &[String], ignore_old: bool) -> Result<usize, Self::Error>;

    /// Leave the cluster gracefully.
    async fn leave(&self) -> Result<(), Self::Error>;

    /// Replace the tags gossiped for this node.
    async fn set_tags(&self, tags: HashMap<String, String>) -> Result<(), Self::Error>;

    /// Stop the transport.
    ///
    /// Every clone of the event sender must be released so that the
    /// consumer's channel closes.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}
