use std::sync::OnceLock;

use regex::Regex;

const MOBILE_AGENT_PATTERN: &str =
    r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini";

fn mobile_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(MOBILE_AGENT_PATTERN).ok())
        .as_ref()
}

/// User-agent heuristic for handsets and tablets.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    mobile_pattern().is_some_and(|re| re.is_match(user_agent))
}
