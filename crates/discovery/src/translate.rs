//! Translation of transport peers into members

use std::net::SocketAddr;

use crate::event::{MemberEvent, PeerDescriptor};
use crate::member::Member;

/// Converts raw transport peers into [`Member`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventTranslator;

impl EventTranslator {
    /// Translate a single peer.
    ///
    /// The transport only knows one reachable endpoint for remote peers, so
    /// it is used as both the bind and the advertise address.
    #[must_use]
    pub fn translate_peer(peer: &PeerDescriptor) -> Member {
        let endpoint = SocketAddr::new(peer.addr, peer.port).to_string();

        Member::new(peer.name.clone(), endpoint.clone(), endpoint).with_tags(peer.tags.clone())
    }

    /// Translate every peer of an event, preserving order
    #[must_use]
    pub fn translate(event: &MemberEvent) -> Vec<Member> {
        event.peers.iter().map(Self::translate_peer).collect()
    }
}
