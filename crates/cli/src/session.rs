//! Cookie persistence between CLI runs
//!
//! A browser keeps the refresh cookie across page loads; the CLI keeps it in
//! a small file next to the session file so `moim` invocations after `login`
//! can still reissue the access token.

use anyhow::Result;
use moim_http::client::write_private;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CookieFile {
    path: PathBuf,
    url: Url,
    jar: Arc<Jar>,
}

impl CookieFile {
    /// Load saved cookies for `base_url` into a fresh jar
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL
    pub fn load(path: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        let path = path.into();
        let url = Url::parse(base_url)?;
        let jar = Arc::new(Jar::default());

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                for cookie in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
                    jar.add_cookie_str(&format!("{cookie}; Path=/"), &url);
                }
                debug!(path = %path.display(), "Loaded saved cookies");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), "Failed to read cookie file: {err}"),
        }

        Ok(Self { path, url, jar })
    }

    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the jar's current cookies back to disk, one `name=value` per line
    ///
    /// The file holds the refresh cookie, so only the owner may read it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self) -> Result<()> {
        let cookies = self
            .jar
            .cookies(&self.url)
            .and_then(|header| header.to_str().map(ToString::to_string).ok())
            .unwrap_or_default();

        let lines: Vec<&str> = cookies
            .split(';')
            .map(str::trim)
            .filter(|cookie| !cookie.is_empty())
            .collect();

        write_private(&self.path, lines.join("\n").as_bytes())?;
        Ok(())
    }

    /// Forget every saved cookie
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_survive_a_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let url = "http://localhost:8080/api";

        let cookies = CookieFile::load(&path, url).unwrap();
        cookies.jar().add_cookie_str(
            "refreshToken=r1; Path=/; HttpOnly",
            &Url::parse(url).unwrap(),
        );
        cookies.save().unwrap();

        let reloaded = CookieFile::load(&path, url).unwrap();
        let header = reloaded
            .jar()
            .cookies(&Url::parse("http://localhost:8080/api/auth/reissue").unwrap())
            .unwrap();
        assert_eq!(header.to_str().unwrap(), "refreshToken=r1");

        reloaded.clear().unwrap();
        assert!(!path.exists());
        reloaded.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn saved_cookies_are_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let url = "http://localhost:8080/api";

        let cookies = CookieFile::load(&path, url).unwrap();
        cookies
            .jar()
            .add_cookie_str("refreshToken=r1; Path=/", &Url::parse(url).unwrap());
        cookies.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CookieFile::load(dir.path().join("cookies.txt"), "/api").is_err());
    }
}
