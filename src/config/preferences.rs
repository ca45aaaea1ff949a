//! User preferences
//!
//! Key/value store persisted as JSON in ~/.pgexplorer/config.json. Holds the
//! recent connections, the query history, window and splitter layout, and
//! the browse row limit. Keys the program does not know about are kept and
//! written back untouched.

use crate::config::ConnectionProfile;
use crate::error::{ConfigError, ConfigResult};
use crate::history::{HISTORY_CAPACITY, QueryHistory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Maximum number of remembered connection profiles
pub const RECENT_CONNECTIONS_CAPACITY: usize = 10;

/// Row limit used by "browse table" when none is configured
pub const DEFAULT_QUERY_LIMIT: u64 = 100;

const KEY_RECENT: &str = "recent_connections";
const KEY_HISTORY: &str = "query_history";
const KEY_WINDOW: &str = "window";
const KEY_SPLITTERS: &str = "splitters";
const KEY_QUERY_LIMIT: &str = "query_limit";

/// Saved main window geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub size: [u32; 2],
    pub position: [i32; 2],
    #[serde(default)]
    pub maximized: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            size: [1000, 700],
            position: [100, 100],
            maximized: false,
        }
    }
}

/// Saved pane sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterState {
    pub h_splitter: Vec<u32>,
    pub v_splitter: Vec<u32>,
}

impl Default for SplitterState {
    fn default() -> Self {
        Self {
            h_splitter: vec![250, 750],
            v_splitter: vec![300, 400],
        }
    }
}

fn defaults() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(KEY_RECENT.into(), json!([]));
    map.insert(KEY_WINDOW.into(), json!(WindowState::default()));
    map.insert(KEY_SPLITTERS.into(), json!(SplitterState::default()));
    map.insert(KEY_HISTORY.into(), json!([]));
    map.insert(KEY_QUERY_LIMIT.into(), json!(DEFAULT_QUERY_LIMIT));
    map
}

/// Persistent preference store
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    values: Map<String, Value>,
    /// `None` for an in-memory store that never touches disk
    path: Option<PathBuf>,
}

impl PreferenceStore {
    /// Default preferences file location
    pub fn default_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".pgexplorer").join("config.json"))
    }

    /// Load from the default location
    pub fn load() -> ConfigResult<Self> {
        Ok(Self::load_from(Self::default_path()?))
    }

    /// Load from `path`. A missing or unreadable file yields the defaults.
    pub fn load_from(path: PathBuf) -> Self {
        let mut values = defaults();
        match read_map(&path) {
            Ok(Some(stored)) => {
                // Stored keys win; defaults fill the gaps
                values.extend(stored);
                tracing::debug!(path = %path.display(), "Loaded preferences");
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No preferences file, using defaults");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences");
            }
        }
        Self {
            values,
            path: Some(path),
        }
    }

    /// Store with default values that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            values: defaults(),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw value for `key`, or `default` when absent
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Set `key` and persist. On a write failure the new value is kept in
    /// memory and the error is returned for the caller to report.
    pub fn set(&mut self, key: &str, value: Value) -> ConfigResult<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    /// Write the whole store to disk
    pub fn save(&self) -> ConfigResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Saved preferences");
        Ok(())
    }

    /// Remembered connection profiles, newest first. Malformed entries are
    /// skipped here but stay in the stored list.
    pub fn recent_connections(&self) -> Vec<ConnectionProfile> {
        self.recent_entries()
            .iter()
            .filter_map(|v| match serde_json::from_value(v.clone()) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(entry = %v, error = %e, "Skipping malformed recent connection");
                    None
                }
            })
            .collect()
    }

    fn recent_entries(&self) -> Vec<Value> {
        match self.values.get(KEY_RECENT) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Remember a profile that connected successfully. The password is never
    /// stored; an entry with the same identity is replaced and moved to the front.
    pub fn add_recent_connection(&mut self, profile: &ConnectionProfile) -> ConfigResult<()> {
        let mut entries = self.recent_entries();
        entries.retain(|v| {
            !serde_json::from_value::<ConnectionProfile>(v.clone())
                .is_ok_and(|p| p.same_identity(profile))
        });
        entries.insert(0, serde_json::to_value(profile.without_password())?);
        entries.truncate(RECENT_CONNECTIONS_CAPACITY);
        self.set(KEY_RECENT, Value::Array(entries))
    }

    pub fn clear_recent_connections(&mut self) -> ConfigResult<()> {
        self.set(KEY_RECENT, json!([]))
    }

    /// Executed queries, newest first, deduplicated and capped the same way
    /// new entries are
    pub fn query_history(&self) -> Vec<String> {
        let stored = match self.values.get(KEY_HISTORY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        QueryHistory::from_entries(stored, HISTORY_CAPACITY).into_entries()
    }

    /// Record an executed query. Text is trimmed and empty text is ignored.
    pub fn add_query_history(&mut self, text: &str) -> ConfigResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let mut history = QueryHistory::from_entries(self.query_history(), HISTORY_CAPACITY);
        history.push(text);
        self.set(KEY_HISTORY, json!(history.into_entries()))
    }

    pub fn clear_query_history(&mut self) -> ConfigResult<()> {
        self.set(KEY_HISTORY, json!([]))
    }

    /// Row limit for browse queries
    pub fn query_limit(&self) -> u64 {
        self.values
            .get(KEY_QUERY_LIMIT)
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_QUERY_LIMIT)
    }

    pub fn set_query_limit(&mut self, limit: u64) -> ConfigResult<()> {
        if limit == 0 {
            return Err(ConfigError::Invalid("query_limit must be positive".into()));
        }
        self.set(KEY_QUERY_LIMIT, json!(limit))
    }

    pub fn window(&self) -> WindowState {
        self.typed(KEY_WINDOW)
    }

    pub fn set_window(&mut self, state: &WindowState) -> ConfigResult<()> {
        self.set(KEY_WINDOW, serde_json::to_value(state)?)
    }

    pub fn splitters(&self) -> SplitterState {
        self.typed(KEY_SPLITTERS)
    }

    pub fn set_splitters(&mut self, state: &SplitterState) -> ConfigResult<()> {
        self.set(KEY_SPLITTERS, serde_json::to_value(state)?)
    }

    fn typed<T: serde::de::DeserializeOwned + Default>(&self, key: &str) -> T {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// `Ok(None)` when the file does not exist
fn read_map(path: &Path) -> ConfigResult<Option<Map<String, Value>>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(ConfigError::Invalid(
            "preferences file is not a JSON object".into(),
        )),
    }
}
