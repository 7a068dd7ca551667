use srouter_discovery::GossipTransportError;
use thiserror::Error;

/// Errors raised by the in-memory gossip transport
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The advertise host must be an IP literal
    #[error("advertise host '{0}' is not an IP address")]
    InvalidAdvertiseAddr(String),

    /// Another live node already uses this name
    #[error("node name '{0}' is already in use on the network")]
    NameConflict(String),

    /// None of the seeds matched a live node
    #[error("no seed reachable among {0:?}")]
    NoSeedReachable(Vec<String>),

    /// The node was shut down
    #[error("node '{0}' is not running")]
    NotRunning(String),
}

impl GossipTransportError for Error {}
