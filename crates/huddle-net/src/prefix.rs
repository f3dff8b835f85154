//! Network identity normalisation and human-readable group labels.
//!
//! A network identity is a coarse fingerprint of "which LAN am I on":
//! private addresses keep three octets, public addresses keep two.

/// Identity reported when a mobile device could not be located.
pub const MOBILE_NETWORK: &str = "mobile-network";
/// Identity reported when every detection step failed.
pub const UNKNOWN_NETWORK: &str = "unknown-network";

const PRIVATE_PREFIXES: [&str; 3] = ["192.168.", "10.", "172."];

/// Collapse a dotted-quad address into its grouping prefix.
///
/// Inputs that are not four dot-separated parts are returned unchanged.
pub fn get_network_prefix(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return ip.to_string();
    }

    if PRIVATE_PREFIXES.iter().any(|p| ip.starts_with(p)) {
        format!("{}.{}.{}.x", parts[0], parts[1], parts[2])
    } else {
        format!("{}.{}.x.x", parts[0], parts[1])
    }
}

/// Label shown for the group whose id is `identity`.
pub fn generate_group_name(identity: &str) -> String {
    if identity.starts_with("192.168.") {
        format!("Home Network ({identity})")
    } else if identity.starts_with("10.") {
        format!("Office Network ({identity})")
    } else if identity.starts_with("172.") {
        format!("Corporate Network ({identity})")
    } else if identity == MOBILE_NETWORK {
        "Mobile Network".to_string()
    } else if identity == UNKNOWN_NETWORK {
        "Unknown Network".to_string()
    } else {
        format!("Public Network ({identity})")
    }
}

/// True for the sentinel identities produced by the fallback chain.
pub fn is_fallback_identity(identity: &str) -> bool {
    identity == MOBILE_NETWORK || identity == UNKNOWN_NETWORK
}
