//! Access token storage
//!
//! The client never owns the token; it reads and writes it through
//! [`TokenStore`] so hosts decide where it lives.

use std::sync::RwLock;

/// Key the access token is persisted under
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Shared, last-writer-wins slot holding the current access token
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn clear(&self);
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: &str) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::{FileTokenStore, write_private};

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{ACCESS_TOKEN_KEY, TokenStore};
    use serde_json::{Map, Value};
    use std::ffi::OsString;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Replace `path` with `content`, readable by the owner only
    ///
    /// The content goes to a sibling temp file first and is renamed over
    /// `path`, so readers see either the old file or the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, temp file or rename fails
    pub fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        let mut temp_name = OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(format!(".{}.tmp", std::process::id()));
        let temp_path = path.with_file_name(temp_name);

        let written = (|| -> std::io::Result<()> {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&temp_path)?;

            // A leftover temp file keeps its old mode; tighten it either way
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }

            file.write_all(content)?;
            file.sync_all()?;
            std::fs::rename(&temp_path, path)
        })();

        if written.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        written
    }

    /// Durable key-value file holding the access token across restarts
    ///
    /// Other keys in the file are preserved. I/O failures are logged and
    /// read back as "no token".
    #[derive(Debug)]
    pub struct FileTokenStore {
        path: PathBuf,
        lock: Mutex<()>,
    }

    impl FileTokenStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                lock: Mutex::new(()),
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn load(&self) -> Map<String, Value> {
            let content = match std::fs::read_to_string(&self.path) {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Map::new(),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), "Failed to read token store: {err}");
                    return Map::new();
                }
            };

            match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(entries)) => entries,
                Ok(_) | Err(_) => {
                    tracing::warn!(path = %self.path.display(), "Ignoring malformed token store");
                    Map::new()
                }
            }
        }

        fn save(&self, entries: &Map<String, Value>) {
            let result = serde_json::to_string_pretty(entries)
                .map_err(std::io::Error::from)
                .and_then(|content| write_private(&self.path, content.as_bytes()));

            if let Err(err) = result {
                tracing::warn!(path = %self.path.display(), "Failed to write token store: {err}");
            }
        }

        fn update(&self, apply: impl FnOnce(&mut Map<String, Value>)) {
            let _guard = self
                .lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut entries = self.load();
            apply(&mut entries);
            self.save(&entries);
        }
    }

    impl TokenStore for FileTokenStore {
        fn get(&self) -> Option<String> {
            let _guard = self
                .lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.load()
                .get(ACCESS_TOKEN_KEY)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        }

        fn set(&self, token: &str) {
            self.update(|entries| {
                entries.insert(ACCESS_TOKEN_KEY.to_string(), Value::from(token));
            });
        }

        fn clear(&self) {
            self.update(|entries| {
                entries.remove(ACCESS_TOKEN_KEY);
            });
        }
    }
}
