//! Gossip-driven cluster membership for the request router.
//!
//! This crate provides:
//! - Member value types and the concurrent member registry
//! - The gossip transport abstraction and its event model
//! - The membership event loop and pluggable member handlers
//! - The `Membership` facade that ties the lifecycle together
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod address;
pub mod config;
pub mod error;
pub mod event;
pub mod event_loop;
pub mod handler;
pub mod member;
pub mod membership;
pub mod registry;
pub mod transport;
pub mod translate;

pub use address::{AddressError, HostPort, split_host_port, split_seeds};
pub use config::{DEFAULT_EVENT_BUFFER, MembershipConfig};
pub use error::{Error, ErrorKind};
pub use event::{GossipEvent, MemberEvent, MemberEventKind, PeerDescriptor, UserEvent};
pub use event_loop::{EventLoop, LoopState};
pub use handler::{HandlerError, MemberHandler, NoopHandler};
pub use member::{Member, TAG_GROUP, TAG_REPLICAS, TAG_SERVICE};
pub use membership::Membership;
pub use registry::MemberRegistry;
pub use transport::{GossipTransport, GossipTransportError, TransportConfig};
pub use translate::EventTranslator;
