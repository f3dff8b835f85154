//! In-memory directory of remote peers with a derived group-by-network view.
//!
//! Groups are recomputed from the directory on every call; nothing is cached.
//! Every operation is total: unknown ids are no-ops and lookups return
//! `Option`.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::peer::{Group, GroupStats, PeerRecord};

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct PeerGroupRegistry {
    /// Insertion order; re-registration keeps the existing slot.
    peers: Vec<PeerRecord>,
    local_identity: Option<String>,
    stale_after: Duration,
}

impl Default for PeerGroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerGroupRegistry {
    pub fn new() -> Self {
        Self::with_stale_after(DEFAULT_STALE_AFTER)
    }

    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            peers: Vec::new(),
            local_identity: None,
            stale_after,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn set_local_network_identity(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        info!("local network identity: {}", identity);
        self.local_identity = Some(identity).filter(|id| !id.is_empty());
    }

    pub fn local_network_identity(&self) -> Option<&str> {
        self.local_identity.as_deref()
    }

    fn position(&self, peer_id: &str) -> Option<usize> {
        self.peers.iter().position(|p| p.id == peer_id)
    }

    /// Insert or overwrite by id. `last_seen` is always reset to now.
    pub fn add_peer(&mut self, mut record: PeerRecord) {
        record.last_seen = Instant::now();
        match self.position(&record.id) {
            Some(index) => {
                debug!("re-registered peer {}", record.id);
                self.peers[index] = record;
            }
            None => {
                debug!(
                    "registered peer {} on {}",
                    record.id, record.network_identity
                );
                self.peers.push(record);
            }
        }
    }

    pub fn remove_peer(&mut self, peer_id: &str) -> Option<PeerRecord> {
        let index = self.position(peer_id)?;
        debug!("removed peer {}", peer_id);
        Some(self.peers.remove(index))
    }

    /// Record a level for a registered peer; unknown ids are ignored.
    pub fn update_audio_level(&mut self, peer_id: &str, level: f32) {
        let Some(index) = self.position(peer_id) else {
            return;
        };
        let peer = &mut self.peers[index];
        peer.audio_level = Some(if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        });
        peer.last_seen = Instant::now();
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| p.id == peer_id)
    }

    pub fn get_all_peers(&self) -> &[PeerRecord] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Partition of all peers by network identity.
    ///
    /// The local group comes first (present even when empty once the local
    /// identity is known); the rest are ordered by name.
    pub fn get_groups(&self) -> Vec<Group> {
        let local = self.local_identity.as_deref();
        let mut groups: Vec<Group> = Vec::new();

        if let Some(identity) = local {
            groups.push(Group::new(identity, true));
        }

        for peer in &self.peers {
            let identity = peer.network_identity.as_str();
            let index = match groups.iter().position(|g| g.id == identity) {
                Some(index) => index,
                None => {
                    groups.push(Group::new(identity, Some(identity) == local));
                    groups.len() - 1
                }
            };
            groups[index].peers.push(peer.clone());
        }

        groups.sort_by(|a, b| match (a.is_local, b.is_local) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => compare_names(&a.name, &b.name),
        });
        groups
    }

    pub fn get_group_by_peer_id(&self, peer_id: &str) -> Option<Group> {
        self.get_peer(peer_id)?;
        self.get_groups().into_iter().find(|g| g.contains(peer_id))
    }

    pub fn get_loudest_peer_in_group(&self, group_id: &str) -> Option<&PeerRecord> {
        loudest(self.peers.iter().filter(|p| p.network_identity == group_id))
    }

    pub fn get_overall_loudest_peer(&self) -> Option<&PeerRecord> {
        loudest(self.peers.iter())
    }

    /// Evict peers not refreshed within the staleness window.
    pub fn cleanup_stale_peers(&mut self) -> Vec<String> {
        self.cleanup_stale_peers_at(Instant::now())
    }

    /// As [`Self::cleanup_stale_peers`], judged against `now`.
    pub fn cleanup_stale_peers_at(&mut self, now: Instant) -> Vec<String> {
        let stale_after = self.stale_after;
        let mut removed = Vec::new();
        self.peers.retain(|peer| {
            let stale = now.saturating_duration_since(peer.last_seen) > stale_after;
            if stale {
                removed.push(peer.id.clone());
            }
            !stale
        });

        if !removed.is_empty() {
            info!("evicted {} stale peer(s): {:?}", removed.len(), removed);
        }
        removed
    }

    pub fn get_group_stats(&self) -> GroupStats {
        let groups = self.get_groups();
        GroupStats {
            total_groups: groups.len(),
            total_peers: self.peers.len(),
            groups_with_multiple_peers: groups.iter().filter(|g| g.peers.len() > 1).count(),
            largest_group_size: groups.iter().map(|g| g.peers.len()).max().unwrap_or(0),
        }
    }
}

/// First record with the strictly highest level.
fn loudest<'a>(mut peers: impl Iterator<Item = &'a PeerRecord>) -> Option<&'a PeerRecord> {
    let first = peers.next()?;
    Some(peers.fold(first, |best, peer| {
        if peer.level() > best.level() {
            peer
        } else {
            best
        }
    }))
}

/// Case-insensitive ordering with a byte-wise tie break.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
