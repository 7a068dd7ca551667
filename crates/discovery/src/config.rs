//! Membership configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::address::split_seeds;

/// Default capacity of the transport event channel
pub const DEFAULT_EVENT_BUFFER: usize = 3;

const fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

/// Configuration for a node's membership
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MembershipConfig {
    /// This node's id
    pub node_id: String,

    /// Local endpoint to bind (`host:port`)
    pub bind_addr: String,

    /// Endpoint advertised to peers (`host:port`)
    pub advertise_addr: String,

    /// Tags gossiped for this node
    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Seed routers joined on start
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Capacity of the transport event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl MembershipConfig {
    /// Create a configuration with no tags and no seeds
    pub fn new(
        node_id: impl Into<String>,
        bind_addr: impl Into<String>,
        advertise_addr: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            bind_addr: bind_addr.into(),
            advertise_addr: advertise_addr.into(),
            tags: HashMap::new(),
            seeds: Vec::new(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the gossiped tags
    #[must_use]
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the seeds joined on start
    #[must_use]
    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Set the seeds from a comma separated router list
    #[must_use]
    pub fn with_routers(self, routers: &str) -> Self {
        self.with_seeds(split_seeds(routers))
    }

    /// Set the event channel capacity
    #[must_use]
    pub const fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    /// Event channel capacity, never zero
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_buffer.max(1)
    }
}
