//! In-memory gossip transport for tests and local development.
//!
//! Nodes created on the same [`MemoryNetwork`] can find each other by name
//! or advertise address. Membership changes are delivered instantly to every
//! node of a cluster, so there is no failure detection to wait for.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use srouter_discovery::{
    GossipEvent, GossipTransport, HostPort, MemberEvent, MemberEventKind, PeerDescriptor,
    TransportConfig, UserEvent, split_host_port,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

type ClusterId = u64;

type Delivery = (mpsc::Sender<GossipEvent>, GossipEvent);

struct NodeEntry {
    peer: PeerDescriptor,
    advertise: HostPort,
    cluster: ClusterId,
    events: mpsc::Sender<GossipEvent>,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<String, NodeEntry>,
    histories: HashMap<ClusterId, Vec<UserEvent>>,
    next_cluster: ClusterId,
}

impl NetworkState {
    const fn new_cluster(&mut self) -> ClusterId {
        let id = self.next_cluster;
        self.next_cluster += 1;
        id
    }

    fn node(&self, name: &str) -> Result<&NodeEntry, Error> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::NotRunning(name.to_string()))
    }

    /// Members of a cluster, sorted by name
    fn cluster(&self, cluster: ClusterId) -> Vec<&NodeEntry> {
        let mut members: Vec<_> = self
            .nodes
            .values()
            .filter(|entry| entry.cluster == cluster)
            .collect();
        members.sort_by(|a, b| a.peer.name.cmp(&b.peer.name));
        members
    }

    fn peers(&self, cluster: ClusterId) -> Vec<PeerDescriptor> {
        self.cluster(cluster)
            .into_iter()
            .map(|entry| entry.peer.clone())
            .collect()
    }

    fn senders(&self, cluster: ClusterId) -> Vec<mpsc::Sender<GossipEvent>> {
        self.cluster(cluster)
            .into_iter()
            .map(|entry| entry.events.clone())
            .collect()
    }

    /// A live node matching `seed` by name or advertise address
    fn find_seed(&self, seed: &str, exclude: &str) -> Option<&NodeEntry> {
        let host_port = split_host_port(seed).ok();

        self.nodes.values().find(|entry| {
            entry.peer.name != exclude
                && (entry.peer.name == seed || host_port.as_ref() == Some(&entry.advertise))
        })
    }

    /// Merge the `joining` cluster into `target`
    fn merge(
        &mut self,
        joining: ClusterId,
        target: ClusterId,
        joiner: &str,
        ignore_old: bool,
        deliveries: &mut Vec<Delivery>,
    ) {
        let joining_peers = self.peers(joining);
        let target_peers = self.peers(target);

        for events in self.senders(joining) {
            let event = MemberEvent::new(MemberEventKind::Join, target_peers.clone());
            deliveries.push((events, event.into()));
        }
        for events in self.senders(target) {
            let event = MemberEvent::new(MemberEventKind::Join, joining_peers.clone());
            deliveries.push((events, event.into()));
        }

        if !ignore_old {
            if let (Some(history), Some(entry)) =
                (self.histories.get(&target), self.nodes.get(joiner))
            {
                debug!("replaying {} user events to {}", history.len(), joiner);
                for event in history {
                    deliveries.push((entry.events.clone(), event.clone().into()));
                }
            }
        }

        let joining_history = self.histories.remove(&joining).unwrap_or_default();
        self.histories
            .entry(target)
            .or_default()
            .extend(joining_history);

        for entry in self.nodes.values_mut() {
            if entry.cluster == joining {
                entry.cluster = target;
            }
        }
    }
}

/// An in-process network shared by memory gossip nodes.
///
/// Clones refer to the same network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    /// Create an empty network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all live nodes, sorted
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().nodes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the nodes in the same cluster as `name`, including itself
    #[must_use]
    pub fn cluster_of(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        state.nodes.get(name).map_or_else(Vec::new, |entry| {
            state
                .cluster(entry.cluster)
                .into_iter()
                .map(|entry| entry.peer.name.clone())
                .collect()
        })
    }
}

impl Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("nodes", &self.node_names())
            .finish()
    }
}

/// A gossip node living on a [`MemoryNetwork`]
pub struct MemoryGossip {
    network: MemoryNetwork,
    name: String,
}

impl MemoryGossip {
    /// Get the node name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Broadcast a user event to the cluster, including this node.
    ///
    /// The event is kept in the cluster's history and replayed to nodes
    /// that join without ignoring old events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] after shutdown.
    pub async fn user_event(
        &self,
        name: impl Into<String> + Send,
        payload: Bytes,
        coalesce: bool,
    ) -> Result<(), Error> {
        let event = UserEvent {
            name: name.into(),
            payload,
            coalesce,
        };

        let deliveries: Vec<Delivery> = {
            let mut state = self.network.state.lock();
            let cluster = state.node(&self.name)?.cluster;
            state
                .histories
                .entry(cluster)
                .or_default()
                .push(event.clone());

            state
                .senders(cluster)
                .into_iter()
                .map(|events| (events, event.clone().into()))
                .collect()
        };

        debug!("node {} broadcasting user event {}", self.name, event.name);
        deliver(deliveries).await;
        Ok(())
    }
}

impl Debug for MemoryGossip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGossip")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for MemoryGossip {
    fn drop(&mut self) {
        if self.network.state.lock().nodes.remove(&self.name).is_some() {
            debug!("memory gossip node {} dropped without shutdown", self.name);
        }
    }
}

async fn deliver(deliveries: Vec<Delivery>) {
    for (events, event) in deliveries {
        if events.send(event).await.is_err() {
            debug!("dropping gossip event for a closed channel");
        }
    }
}

#[async_trait]
impl GossipTransport for MemoryGossip {
    type Error = Error;
    type Options = MemoryNetwork;

    async fn create(
        network: MemoryNetwork,
        config: TransportConfig,
        events: mpsc::Sender<GossipEvent>,
    ) -> Result<Self, Error> {
        let TransportConfig {
            node_name,
            bind,
            advertise,
            tags,
        } = config;

        let addr: IpAddr = advertise
            .host
            .parse()
            .map_err(|_| Error::InvalidAdvertiseAddr(advertise.host.clone()))?;

        let peer = PeerDescriptor {
            name: node_name.clone(),
            addr,
            port: advertise.port,
            tags,
        };

        {
            let mut state = network.state.lock();
            if state.nodes.contains_key(&node_name) {
                return Err(Error::NameConflict(node_name));
            }

            let cluster = state.new_cluster();
            state.nodes.insert(
                node_name.clone(),
                NodeEntry {
                    peer: peer.clone(),
                    advertise,
                    cluster,
                    events: events.clone(),
                },
            );
        }

        info!("memory gossip node {} bound to {}", node_name, bind);

        let event = MemberEvent::new(MemberEventKind::Join, vec![peer]);
        deliver(vec![(events, event.into())]).await;

        Ok(Self {
            network,
            name: node_name,
        })
    }

    async fn join(&self, seeds: &[String], ignore_old: bool) -> Result<usize, Error> {
        let (contacted, deliveries) = {
            let mut state = self.network.state.lock();
            let mut cluster = state.node(&self.name)?.cluster;

            let mut contacted = 0;
            let mut targets = Vec::new();
            for seed in seeds {
                match state.find_seed(seed, &self.name) {
                    Some(entry) => {
                        contacted += 1;
                        if entry.cluster != cluster && !targets.contains(&entry.cluster) {
                            targets.push(entry.cluster);
                        }
                    }
                    None => debug!("seed {} is not reachable", seed),
                }
            }

            if contacted == 0 {
                return Err(Error::NoSeedReachable(seeds.to_vec()));
            }

            let mut deliveries = Vec::new();
            for target in targets {
                state.merge(cluster, target, &self.name, ignore_old, &mut deliveries);
                cluster = target;
            }

            (contacted, deliveries)
        };

        debug!("node {} contacted {} seeds", self.name, contacted);
        deliver(deliveries).await;
        Ok(contacted)
    }

    async fn leave(&self) -> Result<(), Error> {
        let deliveries = {
            let mut state = self.network.state.lock();
            let entry = state.node(&self.name)?;
            let local = entry.peer.clone();
            let own_events = entry.events.clone();
            let cluster = entry.cluster;

            let others: Vec<_> = state
                .cluster(cluster)
                .into_iter()
                .filter(|entry| entry.peer.name != self.name)
                .map(|entry| (entry.peer.clone(), entry.events.clone()))
                .collect();

            let mut deliveries: Vec<Delivery> = others
                .iter()
                .map(|(_, events)| {
                    let event = MemberEvent::new(MemberEventKind::Leave, vec![local.clone()]);
                    (events.clone(), event.into())
                })
                .collect();

            if !others.is_empty() {
                let peers = others.into_iter().map(|(peer, _)| peer).collect();
                let event = MemberEvent::new(MemberEventKind::Leave, peers);
                deliveries.push((own_events, event.into()));
            }

            let solo = state.new_cluster();
            if let Some(entry) = state.nodes.get_mut(&self.name) {
                entry.cluster = solo;
            }

            deliveries
        };

        info!("memory gossip node {} left its cluster", self.name);
        deliver(deliveries).await;
        Ok(())
    }

    async fn set_tags(&self, tags: HashMap<String, String>) -> Result<(), Error> {
        let deliveries: Vec<Delivery> = {
            let mut state = self.network.state.lock();
            let entry = state
                .nodes
                .get_mut(&self.name)
                .ok_or_else(|| Error::NotRunning(self.name.clone()))?;
            entry.peer.tags = tags;

            let peer = entry.peer.clone();
            let cluster = entry.cluster;

            state
                .senders(cluster)
                .into_iter()
                .map(|events| {
                    let event = MemberEvent::new(MemberEventKind::Update, vec![peer.clone()]);
                    (events, event.into())
                })
                .collect()
        };

        deliver(deliveries).await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Error> {
        let deliveries: Vec<Delivery> = {
            let mut state = self.network.state.lock();
            let Some(entry) = state.nodes.remove(&self.name) else {
                return Ok(());
            };

            let remaining = state.senders(entry.cluster);
            if remaining.is_empty() {
                state.histories.remove(&entry.cluster);
            }

            remaining
                .into_iter()
                .map(|events| {
                    let event = MemberEvent::new(MemberEventKind::Failed, vec![entry.peer.clone()]);
                    (events, event.into())
                })
                .collect()
        };

        info!("memory gossip node {} shut down", self.name);
        deliver(deliveries).await;
        Ok(())
    }
}
