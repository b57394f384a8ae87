//! JSON configuration store and the per-session download snapshot.
//!
//! The store is a small JSON document:
//!
//! ```json
//! {
//!   "retry": 5,
//!   "cache_dir": "/current/dir/cache",
//!   "proxy_config": {
//!     "enable": false,
//!     "proxy": { "http": "http://127.0.0.1:8001", "https": "http://127.0.0.1:8001" }
//!   }
//! }
//! ```
//!
//! It is created with these defaults when missing. Values are looked up with
//! dotted paths (`"proxy_config.proxy.http"`). Opening a resource takes an
//! immutable [`DownloadConfig`] snapshot, so edits made through
//! [`ConfigStore::write`] never affect downloads already in flight.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::fetch::ProxyConfig;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default number of download attempts per image.
pub const DEFAULT_RETRY: u32 = 5;

/// Placeholder proxy written into a fresh configuration file.
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8001";

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read, created or written.
    #[error("config IO error at {path}: {source}")]
    Io {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The dotted key is empty or passes through a non-object value.
    #[error("invalid config key {key:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn parse(path: &Path, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Returns `<cwd>/cache`, or a relative `cache` when the working directory is unknown.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    std::env::current_dir()
        .map(|cwd| cwd.join("cache"))
        .unwrap_or_else(|_| PathBuf::from("cache"))
}

/// The document written when no configuration file exists.
#[must_use]
pub fn default_document() -> Value {
    json!({
        "retry": DEFAULT_RETRY,
        "cache_dir": default_cache_dir().to_string_lossy(),
        "proxy_config": {
            "enable": false,
            "proxy": {
                "http": DEFAULT_PROXY_URL,
                "https": DEFAULT_PROXY_URL,
            }
        }
    })
}

/// JSON configuration document with dotted-path lookups.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    document: Value,
}

impl ConfigStore {
    /// Loads the configuration at `path`, creating it with defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be created or read, and
    /// [`ConfigError::Parse`] if it is not valid JSON.
    #[instrument(fields(path = %path.display()))]
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("config file not found, writing defaults");
            write_document(path, &default_document())?;
        }

        let document = read_document(path)?;
        debug!("config loaded");
        Ok(Self {
            path: Some(path.to_path_buf()),
            document,
        })
    }

    /// Wraps an in-memory document that is never persisted.
    #[must_use]
    pub fn from_document(document: Value) -> Self {
        Self {
            path: None,
            document,
        }
    }

    /// Returns the backing file path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the whole document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Looks up a dotted path such as `"proxy_config.enable"`.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is
    /// not an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.document, |node, segment| node.as_object()?.get(segment))
    }

    /// Looks up a dotted path and deserializes it, falling back to `default`
    /// when missing, `null`, or of the wrong shape.
    #[must_use]
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None | Some(Value::Null) => default,
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!(key, error = %e, "config value has unexpected type, using default");
                default
            }),
        }
    }

    /// Replaces the document, persisting it first when the store is file-backed.
    ///
    /// The file is re-read afterwards so the store reflects what is on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document cannot be written or re-read.
    pub fn write(&mut self, document: Value) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => {
                write_document(path, &document)?;
                self.document = read_document(path)?;
                info!(path = %path.display(), "config saved");
            }
            None => self.document = document,
        }
        Ok(())
    }

    /// Sets a dotted path to `value` and persists the result via [`ConfigStore::write`].
    ///
    /// Missing intermediate objects are created.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] for an empty segment or when an
    /// intermediate value exists but is not an object, and the errors of
    /// [`ConfigStore::write`] otherwise.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidKey {
            key: key.to_string(),
        };
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(invalid());
        }
        let Some((last, parents)) = segments.split_last() else {
            return Err(invalid());
        };

        let mut document = self.document.clone();
        let mut node = &mut document;
        for segment in parents {
            node = node
                .as_object_mut()
                .ok_or_else(invalid)?
                .entry(*segment)
                .or_insert_with(|| json!({}));
        }
        node.as_object_mut()
            .ok_or_else(invalid)?
            .insert((*last).to_string(), value);

        debug!(key, "config value set");
        self.write(document)
    }

    /// Takes the immutable download snapshot for one resource session.
    #[must_use]
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::from_store(self)
    }
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::parse(path, e))
}

fn write_document(path: &Path, document: &Value) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    let raw = serde_json::to_string_pretty(document).map_err(|e| ConfigError::parse(path, e))?;
    fs::write(path, raw).map_err(|e| ConfigError::io(path, e))
}

/// Download settings frozen for the lifetime of one opened resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Attempts per image, always at least 1.
    pub retry: u32,
    /// Proxy mapping, `None` for direct connections.
    pub proxy: Option<ProxyConfig>,
    /// Root under which each remote session gets its own cache directory.
    pub cache_root: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            retry: DEFAULT_RETRY,
            proxy: None,
            cache_root: default_cache_dir(),
        }
    }
}

impl DownloadConfig {
    /// Builds the snapshot from a store.
    ///
    /// A non-positive `retry` falls back to [`DEFAULT_RETRY`]. The proxy map is
    /// only taken when `proxy_config.enable` is true.
    #[must_use]
    pub fn from_store(store: &ConfigStore) -> Self {
        let raw_retry: i64 = store.get_or("retry", i64::from(DEFAULT_RETRY));
        let retry = match u32::try_from(raw_retry) {
            Ok(retry) if retry > 0 => retry,
            _ => {
                warn!(retry = raw_retry, default = DEFAULT_RETRY, "invalid retry count, using default");
                DEFAULT_RETRY
            }
        };

        let proxy = if store.get_or("proxy_config.enable", false) {
            let proxy = store.get_or("proxy_config.proxy", ProxyConfig::all(DEFAULT_PROXY_URL));
            (!proxy.is_empty()).then_some(proxy)
        } else {
            None
        };

        let cache_root = store
            .get_or::<Option<String>>("cache_dir", None)
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(default_cache_dir, PathBuf::from);

        Self {
            retry,
            proxy,
            cache_root,
        }
    }

    /// Overrides the attempt count (values below 1 are raised to 1).
    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry.max(1);
        self
    }

    /// Overrides the cache root.
    #[must_use]
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }
}
