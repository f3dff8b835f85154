//! ICE-style address discovery.
//!
//! No connection is ever established: the probe only learns which address
//! the host would advertise (host candidate) and, failing that, the address a
//! STUN server observes (server-reflexive candidate). Results are rendered as
//! SDP `candidate:` lines so the locator reads them the same way it would read
//! candidates from a peer connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{Error, Result};
use regex::Regex;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::debug;

use crate::stun::StunMessage;

/// Upper bound for a single STUN server to answer.
pub const STUN_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

const HOST_PRIORITY: u32 = 2_122_260_223;
const SRFLX_PRIORITY: u32 = 1_686_052_607;

/// Source of SDP candidate lines, in discovery order.
#[async_trait]
pub trait CandidateProbe: Send + Sync {
    async fn gather(&self) -> Result<Vec<String>>;
}

fn ipv4_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:[0-9]{1,3}\.){3}[0-9]{1,3}").ok())
        .as_ref()
}

/// First dotted-quad found in a candidate line.
pub fn extract_ip_from_candidate(candidate: &str) -> Option<&str> {
    ipv4_pattern()?.find(candidate).map(|m| m.as_str())
}

/// The address a candidate line contributes to grouping, if any.
///
/// Unspecified (`0.*`) addresses carry no locality and are skipped.
pub fn usable_candidate_ip(candidate: &str) -> Option<&str> {
    extract_ip_from_candidate(candidate).filter(|ip| !ip.starts_with("0.") && !ip.contains("::"))
}

pub fn host_candidate_line(addr: SocketAddr) -> String {
    format!(
        "candidate:1 1 udp {} {} {} typ host",
        HOST_PRIORITY,
        addr.ip(),
        addr.port()
    )
}

pub fn srflx_candidate_line(mapped: SocketAddr, base: SocketAddr) -> String {
    format!(
        "candidate:2 1 udp {} {} {} typ srflx raddr {} rport {}",
        SRFLX_PRIORITY,
        mapped.ip(),
        mapped.port(),
        base.ip(),
        base.port()
    )
}

/// Gathers host and server-reflexive candidates against public STUN servers.
#[derive(Debug, Clone)]
pub struct StunCandidateProbe {
    servers: Vec<String>,
}

impl StunCandidateProbe {
    pub fn new(servers: Vec<String>) -> Self {
        Self { servers }
    }

    async fn resolve(server: &str) -> Result<SocketAddr> {
        tokio::net::lookup_host(server)
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| Error::network(format!("no IPv4 address for {server}")))
    }

    /// Local address the routing table picks towards `target`.
    async fn host_address(target: SocketAddr) -> Result<SocketAddr> {
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)).await?;
        socket.connect(target).await?;
        Ok(socket.local_addr()?)
    }

    async fn reflexive_address(target: SocketAddr) -> Result<(SocketAddr, SocketAddr)> {
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)).await?;
        socket.connect(target).await?;
        let base = socket.local_addr()?;

        let request = StunMessage::new_binding_request();
        socket.send(&request.encode()).await?;

        let mut buf = [0u8; 1024];
        let len = time::timeout(STUN_RESPONSE_TIMEOUT, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::timeout(format!("STUN response from {target}")))??;

        let mapped = request.decode_response(&buf[..len])?;
        Ok((mapped, base))
    }
}

#[async_trait]
impl CandidateProbe for StunCandidateProbe {
    async fn gather(&self) -> Result<Vec<String>> {
        let mut candidates = Vec::new();
        let mut last_err = None;

        for server in &self.servers {
            let target = match Self::resolve(server).await {
                Ok(addr) => addr,
                Err(err) => {
                    debug!("cannot resolve STUN server {}: {}", server, err);
                    last_err = Some(err);
                    continue;
                }
            };

            if candidates.is_empty() {
                match Self::host_address(target).await {
                    Ok(addr) => {
                        let line = host_candidate_line(addr);
                        debug!("host candidate: {}", line);
                        let usable = usable_candidate_ip(&line).is_some();
                        candidates.push(line);
                        if usable {
                            return Ok(candidates);
                        }
                    }
                    Err(err) => debug!("host candidate unavailable: {}", err),
                }
            }

            match Self::reflexive_address(target).await {
                Ok((mapped, base)) => {
                    let line = srflx_candidate_line(mapped, base);
                    debug!("srflx candidate via {}: {}", server, line);
                    candidates.push(line);
                    return Ok(candidates);
                }
                Err(err) => {
                    debug!("STUN binding via {} failed: {}", server, err);
                    last_err = Some(err);
                }
            }
        }

        if candidates.is_empty() {
            Err(last_err.unwrap_or_else(|| Error::config("no STUN servers configured")))
        } else {
            Ok(candidates)
        }
    }
}
