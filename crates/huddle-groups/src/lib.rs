//! Directory of remote peers, grouped by the network they appear to share.

#![forbid(unsafe_code)]

pub mod peer;
pub mod registry;

pub use peer::{Group, GroupStats, PeerRecord};
pub use registry::{PeerGroupRegistry, DEFAULT_STALE_AFTER};
