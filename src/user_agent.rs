//! Default User-Agent for page and image requests.
//!
//! Image hosts routinely reject non-browser agents, so every request identifies
//! as a desktop browser unless the client was built with an explicit override.

/// Browser-like User-Agent sent on every request by default.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the User-Agent to send, preferring a non-blank override.
#[must_use]
pub(crate) fn effective_user_agent(override_ua: Option<&str>) -> String {
    override_ua
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_looks_like_browser() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0"));
        assert!(DEFAULT_USER_AGENT.contains("Chrome/"));
    }

    #[test]
    fn test_effective_user_agent_prefers_override() {
        assert_eq!(effective_user_agent(Some("imgview-test/1.0")), "imgview-test/1.0");
    }

    #[test]
    fn test_effective_user_agent_ignores_blank_override() {
        assert_eq!(effective_user_agent(Some("   ")), DEFAULT_USER_AGENT);
        assert_eq!(effective_user_agent(None), DEFAULT_USER_AGENT);
    }
}
