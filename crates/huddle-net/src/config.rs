use std::time::Duration;

use huddle_common::{env_bool, env_duration_ms, env_string};

use crate::device::is_mobile_user_agent;
use crate::echo::DEFAULT_ECHO_URL;

pub const DEFAULT_STUN_SERVERS: [&str; 2] = ["stun.l.google.com:19302", "stun1.l.google.com:19302"];
pub const DEFAULT_CANDIDATE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MOBILE_ECHO_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub stun_servers: Vec<String>,
    pub echo_url: String,
    /// Bound on the whole candidate probe.
    pub candidate_timeout: Duration,
    /// Bound on the echo lookup for mobile devices.
    pub mobile_echo_timeout: Duration,
    /// Bound on the echo lookup for everything else.
    pub echo_timeout: Duration,
    pub user_agent: Option<String>,
    pub force_mobile: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            echo_url: DEFAULT_ECHO_URL.to_string(),
            candidate_timeout: DEFAULT_CANDIDATE_TIMEOUT,
            mobile_echo_timeout: DEFAULT_MOBILE_ECHO_TIMEOUT,
            echo_timeout: DEFAULT_ECHO_TIMEOUT,
            user_agent: None,
            force_mobile: false,
        }
    }
}

impl LocatorConfig {
    /// Defaults overridden by `HUDDLE_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let stun_servers = env_string("HUDDLE_STUN_SERVERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.stun_servers);

        Self {
            stun_servers,
            echo_url: env_string("HUDDLE_IP_ECHO_URL").unwrap_or(defaults.echo_url),
            candidate_timeout: env_duration_ms(
                "HUDDLE_CANDIDATE_TIMEOUT_MS",
                defaults.candidate_timeout,
            ),
            mobile_echo_timeout: env_duration_ms(
                "HUDDLE_MOBILE_ECHO_TIMEOUT_MS",
                defaults.mobile_echo_timeout,
            ),
            echo_timeout: env_duration_ms("HUDDLE_ECHO_TIMEOUT_MS", defaults.echo_timeout),
            user_agent: env_string("HUDDLE_USER_AGENT"),
            force_mobile: env_bool("HUDDLE_FORCE_MOBILE", false),
        }
    }

    pub fn is_mobile(&self) -> bool {
        self.force_mobile
            || self
                .user_agent
                .as_deref()
                .is_some_and(is_mobile_user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LocatorConfig::default();
        assert_eq!(config.stun_servers.len(), 2);
        assert_eq!(config.candidate_timeout, Duration::from_secs(3));
        assert_eq!(config.mobile_echo_timeout, Duration::from_secs(2));
        assert!(!config.is_mobile());
    }

    #[test]
    fn test_mobile_from_user_agent_or_flag() {
        let config = LocatorConfig {
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)".into()),
            ..LocatorConfig::default()
        };
        assert!(config.is_mobile());

        let config = LocatorConfig {
            force_mobile: true,
            ..LocatorConfig::default()
        };
        assert!(config.is_mobile());
    }
}
