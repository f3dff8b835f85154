//! Best-effort detection of the local network identity.
//!
//! Fallback chain, first success wins:
//! 1. candidate probe, bounded by `candidate_timeout`
//! 2. mobile devices: IP echo bounded by `mobile_echo_timeout`, else `mobile-network`
//! 3. other devices: IP echo bounded by `echo_timeout`, else `unknown-network`
//!
//! [`NetworkLocator::detect`] never fails. Callers that need to know whether
//! the result is a guess compare it against the sentinels in [`crate::prefix`].

use std::sync::Arc;

use huddle_common::{Error, Result};
use serde::Serialize;
use tokio::time;
use tracing::{debug, info, warn};

use crate::candidate::{usable_candidate_ip, CandidateProbe, StunCandidateProbe};
use crate::config::LocatorConfig;
use crate::echo::{HttpIpEcho, IpEcho};
use crate::prefix::{generate_group_name, get_network_prefix, MOBILE_NETWORK, UNKNOWN_NETWORK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Address read from a gathered candidate.
    Candidate,
    /// Address reported by the IP echo endpoint.
    ExternalIp,
    /// Sentinel identity; every lookup failed.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub identity: String,
    pub label: String,
    pub source: DetectionSource,
}

impl Detection {
    fn new(identity: String, source: DetectionSource) -> Self {
        let label = generate_group_name(&identity);
        Self {
            identity,
            label,
            source,
        }
    }
}

pub struct NetworkLocator {
    config: LocatorConfig,
    probe: Arc<dyn CandidateProbe>,
    echo: Arc<dyn IpEcho>,
}

impl NetworkLocator {
    /// Locator backed by STUN and the configured HTTP echo endpoint.
    pub fn new(config: LocatorConfig) -> Self {
        let probe = Arc::new(StunCandidateProbe::new(config.stun_servers.clone()));
        let echo = Arc::new(HttpIpEcho::new(config.echo_url.clone()));
        Self::with_sources(config, probe, echo)
    }

    pub fn with_sources(
        config: LocatorConfig,
        probe: Arc<dyn CandidateProbe>,
        echo: Arc<dyn IpEcho>,
    ) -> Self {
        Self {
            config,
            probe,
            echo,
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Network identity of this device. Safe to call repeatedly.
    pub async fn detect(&self) -> String {
        self.detect_detailed().await.identity
    }

    /// Like [`Self::detect`], also reporting which step produced the identity.
    pub async fn detect_detailed(&self) -> Detection {
        debug!("starting network detection");

        match self.probe_candidates().await {
            Ok(ip) => {
                info!("found address via candidate probe: {}", ip);
                return Detection::new(get_network_prefix(&ip), DetectionSource::Candidate);
            }
            Err(err) if err.is_timeout() => {
                warn!("candidate probe timed out, using fallback");
            }
            Err(err) => {
                warn!("candidate probe failed: {}, using fallback", err);
            }
        }

        self.fallback().await
    }

    async fn probe_candidates(&self) -> Result<String> {
        let timeout = self.config.candidate_timeout;
        let lines = time::timeout(timeout, self.probe.gather())
            .await
            .map_err(|_| Error::timeout(format!("candidate probe after {:?}", timeout)))??;

        let ip = lines
            .iter()
            .find_map(|line| usable_candidate_ip(line))
            .map(str::to_string);
        ip.ok_or_else(|| Error::network("no usable candidate address"))
    }

    async fn fallback(&self) -> Detection {
        if self.config.is_mobile() {
            match self.echo.lookup(self.config.mobile_echo_timeout).await {
                Ok(ip) => {
                    info!("got external IP: {}", ip);
                    Detection::new(get_network_prefix(&ip), DetectionSource::ExternalIp)
                }
                Err(err) => {
                    warn!("external IP lookup failed on mobile: {}", err);
                    Detection::new(MOBILE_NETWORK.to_string(), DetectionSource::Fallback)
                }
            }
        } else {
            match self.echo.lookup(self.config.echo_timeout).await {
                Ok(ip) => {
                    info!("got external IP: {}", ip);
                    Detection::new(get_network_prefix(&ip), DetectionSource::ExternalIp)
                }
                Err(err) => {
                    warn!("all network detection methods failed: {}", err);
                    Detection::new(UNKNOWN_NETWORK.to_string(), DetectionSource::Fallback)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProbe(Vec<String>);

    #[async_trait]
    impl CandidateProbe for FixedProbe {
        async fn gather(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl CandidateProbe for FailingProbe {
        async fn gather(&self) -> Result<Vec<String>> {
            Err(Error::network("offline"))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl CandidateProbe for HangingProbe {
        async fn gather(&self) -> Result<Vec<String>> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingEcho {
        ip: Option<String>,
        calls: AtomicUsize,
        last_timeout_ms: AtomicUsize,
    }

    #[async_trait]
    impl IpEcho for RecordingEcho {
        async fn lookup(&self, timeout: Duration) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_timeout_ms
                .store(timeout.as_millis() as usize, Ordering::SeqCst);
            self.ip.clone().ok_or_else(|| Error::network("unreachable"))
        }
    }

    fn mobile_config() -> LocatorConfig {
        LocatorConfig {
            user_agent: Some("Mozilla/5.0 (Linux; Android 14)".into()),
            ..LocatorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_candidate_wins() {
        let echo = Arc::new(RecordingEcho::default());
        let locator = NetworkLocator::with_sources(
            LocatorConfig::default(),
            Arc::new(FixedProbe(vec![
                "candidate:1 1 udp 1 192.168.1.42 40000 typ host".into(),
            ])),
            echo.clone(),
        );

        let detection = locator.detect_detailed().await;
        assert_eq!(detection.identity, "192.168.1.x");
        assert_eq!(detection.label, "Home Network (192.168.1.x)");
        assert_eq!(detection.source, DetectionSource::Candidate);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unusable_candidates_fall_through() {
        let echo = Arc::new(RecordingEcho {
            ip: Some("8.8.4.4".into()),
            ..Default::default()
        });
        let locator = NetworkLocator::with_sources(
            LocatorConfig::default(),
            Arc::new(FixedProbe(vec![
                "candidate:1 1 udp 1 0.0.0.0 40000 typ host".into(),
                "candidate:1 1 udp 1 abc.local 40000 typ host".into(),
            ])),
            echo.clone(),
        );

        let detection = locator.detect_detailed().await;
        assert_eq!(detection.identity, "8.8.x.x");
        assert_eq!(detection.source, DetectionSource::ExternalIp);
    }

    #[tokio::test]
    async fn test_mobile_uses_short_echo_timeout() {
        let echo = Arc::new(RecordingEcho {
            ip: Some("100.64.3.9".into()),
            ..Default::default()
        });
        let locator =
            NetworkLocator::with_sources(mobile_config(), Arc::new(FailingProbe), echo.clone());

        assert_eq!(locator.detect().await, "100.64.x.x");
        assert_eq!(echo.last_timeout_ms.load(Ordering::SeqCst), 2000);
    }

    #[tokio::test]
    async fn test_mobile_sentinel() {
        let locator = NetworkLocator::with_sources(
            mobile_config(),
            Arc::new(FailingProbe),
            Arc::new(RecordingEcho::default()),
        );

        let detection = locator.detect_detailed().await;
        assert_eq!(detection.identity, MOBILE_NETWORK);
        assert_eq!(detection.label, "Mobile Network");
        assert_eq!(detection.source, DetectionSource::Fallback);
    }

    #[tokio::test]
    async fn test_desktop_sentinel() {
        let echo = Arc::new(RecordingEcho::default());
        let locator = NetworkLocator::with_sources(
            LocatorConfig::default(),
            Arc::new(FailingProbe),
            echo.clone(),
        );

        assert_eq!(locator.detect().await, UNKNOWN_NETWORK);
        assert_eq!(echo.last_timeout_ms.load(Ordering::SeqCst), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_candidate_probe_is_bounded() {
        let echo = Arc::new(RecordingEcho {
            ip: Some("10.1.2.3".into()),
            ..Default::default()
        });
        let locator = NetworkLocator::with_sources(
            LocatorConfig::default(),
            Arc::new(HangingProbe),
            echo.clone(),
        );

        let started = time::Instant::now();
        assert_eq!(locator.detect().await, "10.1.2.x");
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(3600));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detect_is_repeatable() {
        let locator = NetworkLocator::with_sources(
            LocatorConfig::default(),
            Arc::new(FixedProbe(vec![
                "candidate:1 1 udp 1 10.0.0.8 40000 typ host".into(),
            ])),
            Arc::new(RecordingEcho::default()),
        );

        assert_eq!(locator.detect().await, locator.detect().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mobile_bound_applies_to_stalled_http_echo() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let locator = NetworkLocator::with_sources(
            mobile_config(),
            Arc::new(FailingProbe),
            Arc::new(HttpIpEcho::with_client(client, url)),
        );

        let started = time::Instant::now();
        let detection = locator.detect_detailed().await;
        let elapsed = started.elapsed();

        assert_eq!(detection.identity, MOBILE_NETWORK);
        assert_eq!(detection.source, DetectionSource::Fallback);
        assert!(elapsed >= Duration::from_secs(2), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10), "returned after {:?}", elapsed);
    }
}
