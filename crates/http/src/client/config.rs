//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API root; the `/api` prefix lets a reverse proxy forward calls
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Per-call timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Endpoint exchanging the refresh cookie for a new access token
pub const DEFAULT_REISSUE_PATH: &str = "/auth/reissue";

/// Paths that never carry a bearer token and never trigger a reissue
pub const DEFAULT_BYPASS_PATHS: &[&str] = &[
    "/auth/login",
    "/auth/signup",
    "/auth/register",
    "/auth/reissue",
];

/// Settings fixed when a [`MoimClient`](super::MoimClient) is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Send cookies with every call so the reissue endpoint sees the refresh cookie
    pub with_credentials: bool,
    pub reissue_path: String,
    pub bypass_paths: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            with_credentials: true,
            reissue_path: DEFAULT_REISSUE_PATH.to_string(),
            bypass_paths: DEFAULT_BYPASS_PATHS
                .iter()
                .map(ToString::to_string)
                .collect(),
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Timeout as a [`Duration`]; zero disables it
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Set of paths exempt from credential attachment and reissue recovery
#[derive(Debug, Clone, Default)]
pub struct BypassPaths {
    paths: Vec<String>,
}

impl BypassPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|path| normalize(path.as_ref()).to_string())
                .collect(),
        }
    }

    /// Whether `path` (query string ignored) is in the set
    pub fn contains(&self, path: &str) -> bool {
        let path = normalize(path);
        self.paths.iter().any(|bypass| bypass == path)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bypass_set() {
        let bypass = BypassPaths::new(DEFAULT_BYPASS_PATHS);
        assert!(bypass.contains("/auth/login"));
        assert!(bypass.contains("/auth/reissue/"));
        assert!(bypass.contains("/auth/signup?from=home"));
        assert!(!bypass.contains("/auth/logout"));
        assert!(!bypass.contains("/meetings"));
        assert!(!bypass.contains("/meetings/auth/login/x"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = ClientConfig {
            timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.timeout(), None);
        assert_eq!(
            ClientConfig::default().timeout(),
            Some(Duration::from_millis(5_000))
        );
    }
}
