//! Error types for membership operations

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error as ThisError;

use crate::address::AddressError;

/// Boxed source error coming from a gossip transport
pub type BoxedSource = Box<dyn StdError + Send + Sync>;

/// Membership errors
#[derive(Debug, ThisError)]
pub enum Error {
    /// Bind or advertise address could not be parsed
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The gossip transport could not be created
    #[error("failed to create gossip transport: {0}")]
    TransportCreate(#[source] BoxedSource),

    /// No seed could be joined
    #[error("failed to join cluster: {0}")]
    Join(#[source] BoxedSource),

    /// Graceful leave failed
    #[error("failed to leave cluster: {0}")]
    Leave(#[source] BoxedSource),

    /// Tags could not be updated
    #[error("failed to update tags: {0}")]
    SetTags(#[source] BoxedSource),

    /// `start` was called on a running membership
    #[error("membership already started")]
    AlreadyStarted,

    /// The operation needs a running membership
    #[error("membership not started")]
    NotStarted,
}

/// The kind of membership error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed `host:port` pair
    AddressParse,

    /// Non-numeric or out of range port
    PortParse,

    /// Transport creation failed
    TransportCreate,

    /// Join failed
    Join,

    /// Leave failed
    Leave,

    /// Tag update failed
    SetTags,

    /// Lifecycle misuse
    Lifecycle,
}

impl Error {
    /// Returns the kind of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Address(AddressError::HostPort { .. }) => ErrorKind::AddressParse,
            Self::Address(AddressError::Port { .. }) => ErrorKind::PortParse,
            Self::TransportCreate(_) => ErrorKind::TransportCreate,
            Self::Join(_) => ErrorKind::Join,
            Self::Leave(_) => ErrorKind::Leave,
            Self::SetTags(_) => ErrorKind::SetTags,
            Self::AlreadyStarted | Self::NotStarted => ErrorKind::Lifecycle,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
