//! CLI configuration utilities

use anyhow::Result;
use moim_http::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the data directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "moim.toml";

/// Session file holding the access token
pub const DEFAULT_SESSION_FILE: &str = "session.json";

/// Cookie file holding the refresh cookie between runs
pub const DEFAULT_COOKIE_FILE: &str = "cookies.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub client: ClientConfig,
    /// Overrides `<data_dir>/session.json`
    pub session_file: Option<PathBuf>,
    /// Overrides `<data_dir>/cookies.txt`
    pub cookie_file: Option<PathBuf>,
}

impl CliConfig {
    /// Load defaults, then the config file, then `MOIM_*` environment variables
    ///
    /// An explicitly given file must exist; the data-directory default is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or parsed
    pub fn load(path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(data_dir.join(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("MOIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session_file(&self, data_dir: &Path) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_SESSION_FILE))
    }

    pub fn cookie_file(&self, data_dir: &Path) -> PathBuf {
        self.cookie_file
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_COOKIE_FILE))
    }
}

/// Resolve the data directory: flag, then `MOIM_STATE_DIR`, then the system data dir
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(moim_data_dir) = std::env::var("MOIM_STATE_DIR") {
            PathBuf::from(moim_data_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("moim")
        }
    })
}

/// Pretty-print the effective configuration
pub fn render(config: &CliConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(None, dir.path()).unwrap();

        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.client.timeout_ms, 5_000);
        assert_eq!(
            config.session_file(dir.path()),
            dir.path().join(DEFAULT_SESSION_FILE)
        );
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(CliConfig::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            r#"
session_file = "/tmp/moim-session.json"

[client]
base_url = "https://moim.example.com/api"
timeout_ms = 2500
with_credentials = false
"#,
        )
        .unwrap();

        let config = CliConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.client.base_url, "https://moim.example.com/api");
        assert_eq!(config.client.timeout_ms, 2_500);
        assert!(!config.client.with_credentials);
        assert_eq!(config.client.reissue_path, "/auth/reissue");
        assert_eq!(
            config.session_file(dir.path()),
            PathBuf::from("/tmp/moim-session.json")
        );
    }
}
