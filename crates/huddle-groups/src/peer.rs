use std::time::Instant;

use huddle_audio::StreamHandle;
use huddle_net::generate_group_name;
use serde::Serialize;

/// A remote participant as known to the registry.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: String,
    /// Live media owned by the peer-connection layer.
    pub stream: StreamHandle,
    pub network_identity: String,
    /// Refreshed by the registry on registration and level updates.
    pub last_seen: Instant,
    /// Smoothed volume in `[0, 1]`; `None` until first sampled.
    pub audio_level: Option<f32>,
}

impl PeerRecord {
    pub fn new(
        id: impl Into<String>,
        stream: StreamHandle,
        network_identity: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            stream,
            network_identity: network_identity.into(),
            last_seen: Instant::now(),
            audio_level: None,
        }
    }

    /// Audio level with "never sampled" read as silence.
    pub fn level(&self) -> f32 {
        self.audio_level.unwrap_or(0.0)
    }
}

/// Peers sharing one network identity.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub network_prefix: String,
    pub is_local: bool,
    pub peers: Vec<PeerRecord>,
}

impl Group {
    pub(crate) fn new(identity: &str, is_local: bool) -> Self {
        Self {
            id: identity.to_string(),
            name: generate_group_name(identity),
            network_prefix: identity.to_string(),
            is_local,
            peers: Vec::new(),
        }
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.iter().any(|p| p.id == peer_id)
    }

    pub fn peer_ids(&self) -> Vec<&str> {
        self.peers.iter().map(|p| p.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub total_groups: usize,
    pub total_peers: usize,
    pub groups_with_multiple_peers: usize,
    pub largest_group_size: usize,
}
