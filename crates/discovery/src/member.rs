//! Cluster member value type

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Tag holding the routing group of a member.
pub const TAG_GROUP: &str = "group";

/// Tag holding the service a member serves.
pub const TAG_SERVICE: &str = "service";

/// Tag holding the replica count of a member.
pub const TAG_REPLICAS: &str = "replicas";

/// A known cluster peer
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Member {
    /// Unique node identifier
    pub id: String,
    /// Bind endpoint (`host:port`)
    pub addr: String,
    /// Advertised endpoint (`host:port`)
    pub advertise: String,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl Member {
    /// Create a member without tags
    pub fn new(id: impl Into<String>, addr: impl Into<String>, advertise: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
            advertise: advertise.into(),
            tags: HashMap::new(),
        }
    }

    /// Replace the tags, builder style
    #[must_use]
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Replace all tags
    pub fn set_tags(&mut self, tags: HashMap<String, String>) {
        self.tags = tags;
    }

    /// Get the tags
    pub const fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// Get a single tag
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Get the routing group
    pub fn group(&self) -> Option<&str> {
        self.tag(TAG_GROUP)
    }

    /// Get the service name
    pub fn service(&self) -> Option<&str> {
        self.tag(TAG_SERVICE)
    }

    /// Get the replica count, `None` if absent or not a number
    pub fn replicas(&self) -> Option<u32> {
        self.tag(TAG_REPLICAS)?.parse().ok()
    }
}
