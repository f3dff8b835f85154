//! Common helper functions for Huddle.

use std::str::FromStr;
use std::time::Duration;

pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or does not parse.
pub fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a millisecond duration from the environment.
pub fn env_duration_ms(name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_parse(name, default_ms))
}

/// Read a non-empty string from the environment.
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_bool_true_values() {
        std::env::set_var("HUDDLE_TEST_ENV_TRUE", "true");
        assert!(env_bool("HUDDLE_TEST_ENV_TRUE", false));

        std::env::set_var("HUDDLE_TEST_ENV_1", "1");
        assert!(env_bool("HUDDLE_TEST_ENV_1", false));

        std::env::set_var("HUDDLE_TEST_ENV_UPPER", "YES");
        assert!(env_bool("HUDDLE_TEST_ENV_UPPER", false));
    }

    #[test]
    fn test_env_bool_false_values() {
        std::env::set_var("HUDDLE_TEST_ENV_OFF", "off");
        assert!(!env_bool("HUDDLE_TEST_ENV_OFF", true));

        std::env::set_var("HUDDLE_TEST_ENV_GARBAGE", "maybe");
        assert!(!env_bool("HUDDLE_TEST_ENV_GARBAGE", true));
    }

    #[test]
    fn test_env_bool_missing_uses_default() {
        assert!(env_bool("HUDDLE_DEFINITELY_NOT_SET_12345", true));
        assert!(!env_bool("HUDDLE_DEFINITELY_NOT_SET_12345", false));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("HUDDLE_TEST_PARSE_OK", " 42 ");
        assert_eq!(env_parse("HUDDLE_TEST_PARSE_OK", 7u32), 42);

        std::env::set_var("HUDDLE_TEST_PARSE_BAD", "forty-two");
        assert_eq!(env_parse("HUDDLE_TEST_PARSE_BAD", 7u32), 7);
    }

    #[test]
    fn test_env_duration_ms() {
        std::env::set_var("HUDDLE_TEST_DURATION", "1500");
        assert_eq!(
            env_duration_ms("HUDDLE_TEST_DURATION", Duration::from_secs(1)),
            Duration::from_millis(1500)
        );
        assert_eq!(
            env_duration_ms("HUDDLE_TEST_DURATION_UNSET", Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_env_string_ignores_blank() {
        std::env::set_var("HUDDLE_TEST_STRING_BLANK", "   ");
        assert_eq!(env_string("HUDDLE_TEST_STRING_BLANK"), None);

        std::env::set_var("HUDDLE_TEST_STRING", " https://example.test ");
        assert_eq!(
            env_string("HUDDLE_TEST_STRING").as_deref(),
            Some("https://example.test")
        );
    }
}
