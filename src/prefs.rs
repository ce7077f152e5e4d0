//! Durable user preferences: favorite ids, column selections, theme.
//!
//! The store is a flat key/value surface addressed by fixed string keys.
//! Reads never fail outward: a missing or corrupt entry is reported as
//! absent and the caller falls back to its default. Writes are
//! last-write-wins with no cross-key transaction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const PREF_KEY_COIN_FAVORITES: &str = "favoriteCoins";
pub const PREF_KEY_COIN_COLUMNS: &str = "userSelectedColumns";
pub const PREF_KEY_EXCHANGE_FAVORITES: &str = "favoriteExchanges";
pub const PREF_KEY_EXCHANGE_COLUMNS: &str = "userSelectedExchangeColumns";
pub const PREF_KEY_THEME: &str = "theme_preferred_mode";

/// Injected persistence capability. Implementations own durability;
/// callers own the shape of each value.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Reads a stored string-id array, reporting absent and wrongly shaped
/// entries as `None` so the caller can tell "never stored" apart from a
/// stored empty list. Non-string elements are dropped, not errors.
pub fn load_id_list_opt(store: &dyn PreferenceStore, key: &str) -> Option<Vec<String>> {
    match store.get(key) {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(id) => Some(id),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Like [`load_id_list_opt`] but degrades anything missing to empty.
pub fn load_id_list(store: &dyn PreferenceStore, key: &str) -> Vec<String> {
    load_id_list_opt(store, key).unwrap_or_default()
}

pub fn store_id_list(store: &dyn PreferenceStore, key: &str, ids: &[String]) {
    let items = ids.iter().map(|id| Value::String(id.clone())).collect();
    store.set(key, Value::Array(items));
}

pub fn load_theme(store: &dyn PreferenceStore) -> Option<Theme> {
    match store.get(PREF_KEY_THEME) {
        Some(Value::String(raw)) => Theme::parse(&raw),
        _ => None,
    }
}

pub fn store_theme(store: &dyn PreferenceStore, theme: Theme) {
    store.set(PREF_KEY_THEME, Value::String(theme.as_str().to_string()));
}

/// Volatile store for tests and demo mode.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .expect("preference map lock should not be poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries
            .write()
            .expect("preference map lock should not be poisoned")
            .insert(key.to_string(), value);
    }
}

#[derive(Debug, Error)]
pub enum PrefsOpenError {
    #[error("failed to open preference database: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// SQLite-backed store: one `prefs` table, JSON-encoded values. A single
/// session is assumed to be the sole writer at a time; concurrent writers
/// to the same key resolve last-write-wins through the upsert.
pub struct SqlitePreferenceStore {
    conn: Mutex<Connection>,
}

impl SqlitePreferenceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PrefsOpenError> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS prefs (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, PrefsOpenError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS prefs (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_raw(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let conn = self
            .conn
            .lock()
            .expect("preference db lock should not be poisoned");
        conn.query_row("SELECT value FROM prefs WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.read_raw(key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(
                    component = "prefs",
                    event = "prefs.read_failed",
                    key,
                    error = %err
                );
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    component = "prefs",
                    event = "prefs.corrupt_value",
                    key,
                    error = %err
                );
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) {
        let payload = value.to_string();
        let conn = self
            .conn
            .lock()
            .expect("preference db lock should not be poisoned");
        let written = conn.execute(
            "INSERT INTO prefs (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, payload.as_str()],
        );
        if let Err(err) = written {
            warn!(
                component = "prefs",
                event = "prefs.write_failed",
                key,
                error = %err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_reads_as_absent() {
        let store = InMemoryPreferenceStore::new();
        assert_eq!(store.get(PREF_KEY_COIN_FAVORITES), None);
        assert!(load_id_list(&store, PREF_KEY_COIN_FAVORITES).is_empty());
    }

    #[test]
    fn id_list_round_trips_and_drops_non_strings() {
        let store = InMemoryPreferenceStore::new();
        store_id_list(
            &store,
            PREF_KEY_COIN_FAVORITES,
            &["BTC".to_string(), "ETH".to_string()],
        );
        assert_eq!(
            load_id_list(&store, PREF_KEY_COIN_FAVORITES),
            vec!["BTC".to_string(), "ETH".to_string()]
        );

        store.set(PREF_KEY_COIN_FAVORITES, json!(["BTC", 7, null, "ETH"]));
        assert_eq!(
            load_id_list(&store, PREF_KEY_COIN_FAVORITES),
            vec!["BTC".to_string(), "ETH".to_string()]
        );
    }

    #[test]
    fn wrongly_shaped_value_degrades_to_empty_list() {
        let store = InMemoryPreferenceStore::new();
        store.set(PREF_KEY_COIN_COLUMNS, json!({"not": "an array"}));
        assert!(load_id_list(&store, PREF_KEY_COIN_COLUMNS).is_empty());
    }

    #[test]
    fn theme_round_trips_and_rejects_unknown_values() {
        let store = InMemoryPreferenceStore::new();
        assert_eq!(load_theme(&store), None);

        store_theme(&store, Theme::Dark);
        assert_eq!(load_theme(&store), Some(Theme::Dark));

        store.set(PREF_KEY_THEME, json!("sepia"));
        assert_eq!(load_theme(&store), None);
    }

    #[test]
    fn last_write_wins_on_same_key() {
        let store = InMemoryPreferenceStore::new();
        store.set(PREF_KEY_THEME, json!("light"));
        store.set(PREF_KEY_THEME, json!("dark"));
        assert_eq!(load_theme(&store), Some(Theme::Dark));
    }

    #[test]
    fn sqlite_store_round_trips_in_memory() {
        let store = SqlitePreferenceStore::open_in_memory().unwrap();
        store.set(PREF_KEY_EXCHANGE_FAVORITES, json!(["2431"]));
        assert_eq!(
            load_id_list(&store, PREF_KEY_EXCHANGE_FAVORITES),
            vec!["2431".to_string()]
        );
        assert_eq!(store.get("unknown"), None);
    }
}
