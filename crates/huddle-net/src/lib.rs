//! Network identity detection for Huddle.
//!
//! Produces a coarse "which LAN am I on" string so peers on the same network
//! can be grouped together.

#![forbid(unsafe_code)]

pub mod candidate;
pub mod config;
pub mod device;
pub mod echo;
pub mod locator;
pub mod prefix;
pub mod stun;

pub use candidate::{CandidateProbe, StunCandidateProbe};
pub use config::LocatorConfig;
pub use device::is_mobile_user_agent;
pub use echo::{HttpIpEcho, IpEcho};
pub use locator::{Detection, DetectionSource, NetworkLocator};
pub use prefix::{
    generate_group_name, get_network_prefix, is_fallback_identity, MOBILE_NETWORK,
    UNKNOWN_NETWORK,
};
