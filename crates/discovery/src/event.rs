//! Raw events emitted by a gossip transport

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;

/// A peer as reported by the gossip transport
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PeerDescriptor {
    /// Node name (the member id)
    pub name: String,
    /// Reachable IP address
    pub addr: IpAddr,
    /// Reachable port
    pub port: u16,
    /// Tags gossiped by the peer
    pub tags: HashMap<String, String>,
}

/// Kind of membership change
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum MemberEventKind {
    /// Peers joined the cluster
    Join,
    /// Peers changed their tags
    Update,
    /// Peers left gracefully
    Leave,
    /// Peers were detected as failed
    Failed,
    /// Failed or left peers were reaped from the transport's member list
    Reap,
}

impl fmt::Display for MemberEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => write!(f, "member-join"),
            Self::Update => write!(f, "member-update"),
            Self::Leave => write!(f, "member-leave"),
            Self::Failed => write!(f, "member-failed"),
            Self::Reap => write!(f, "member-reap"),
        }
    }
}

/// A batched membership change
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemberEvent {
    /// What happened
    pub kind: MemberEventKind,
    /// Peers it happened to, in transport order
    pub peers: Vec<PeerDescriptor>,
}

impl MemberEvent {
    /// Create a member event
    #[must_use]
    pub const fn new(kind: MemberEventKind, peers: Vec<PeerDescriptor>) -> Self {
        Self { kind, peers }
    }
}

/// A user broadcast carried by the gossip layer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UserEvent {
    /// Event name
    pub name: String,
    /// Opaque payload
    pub payload: Bytes,
    /// Whether the transport may coalesce events with the same name
    pub coalesce: bool,
}

/// Anything a gossip transport can deliver on the event channel
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum GossipEvent {
    /// Membership change
    Member(MemberEvent),
    /// User broadcast
    User(UserEvent),
}

impl From<MemberEvent> for GossipEvent {
    fn from(event: MemberEvent) -> Self {
        Self::Member(event)
    }
}

impl From<UserEvent> for GossipEvent {
    fn from(event: UserEvent) -> Self {
        Self::User(event)
    }
}
