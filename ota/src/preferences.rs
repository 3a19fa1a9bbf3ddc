//! Key/value preference storage, grouped by domain.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PreferenceError;

pub trait Preferences {
    fn get(&self, domain: &str, key: &str) -> Option<String>;

    fn set(&mut self, domain: &str, key: &str, value: &str) -> Result<(), PreferenceError>;
}

impl<P: Preferences + ?Sized> Preferences for Box<P> {
    fn get(&self, domain: &str, key: &str) -> Option<String> {
        (**self).get(domain, key)
    }

    fn set(&mut self, domain: &str, key: &str, value: &str) -> Result<(), PreferenceError> {
        (**self).set(domain, key, value)
    }
}

/// Where preferences live when no path is configured.
pub fn default_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("runmod").join("preferences.json"))
}

/// Stored preferences: domain, then key, then value.
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub domains: BTreeMap<String, BTreeMap<String, String>>,
}

impl Store {
    fn get(&self, domain: &str, key: &str) -> Option<String> {
        self.domains.get(domain)?.get(key).cloned()
    }

    fn set(&mut self, domain: &str, key: &str, value: &str) {
        self.domains
            .entry(domain.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
    }
}

pub fn save(store: &Store, writer: impl Write) -> Result<(), PreferenceError> {
    serde_json::to_writer_pretty(writer, store)?;
    Ok(())
}

pub fn save_to(store: &Store, path: impl AsRef<Path>) -> Result<(), PreferenceError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let f = std::fs::File::create(path)?;
    save(store, &f)
}

pub fn load(reader: impl Read) -> Result<Store, PreferenceError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_from(path: impl AsRef<Path>) -> Result<Store, PreferenceError> {
    let f = std::fs::File::open(path)?;
    load(f)
}

/// Preferences persisted as a JSON file, rewritten on every change.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    current: Store,
}

impl FilePreferences {
    /// Load preferences from `path`, creating an empty store if the file is
    /// missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let span = tracing::debug_span!("FilePreferences", path = %path.display());
        let _guard = span.enter();

        match load_from(&path) {
            Ok(current) => {
                tracing::debug!("preferences loaded");
                Ok(Self { path, current })
            }
            Err(PreferenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no preferences file, creating one");
                let current = Store::default();
                save_to(&current, &path)?;
                Ok(Self { path, current })
            }
            Err(e) => Err(e),
        }
    }

    pub fn current(&self) -> &Store {
        &self.current
    }
}

impl Preferences for FilePreferences {
    fn get(&self, domain: &str, key: &str) -> Option<String> {
        self.current.get(domain, key)
    }

    fn set(&mut self, domain: &str, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.current.set(domain, key, value);
        save_to(&self.current, &self.path)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    current: Store,
}

impl Preferences for MemoryPreferences {
    fn get(&self, domain: &str, key: &str) -> Option<String> {
        self.current.get(domain, key)
    }

    fn set(&mut self, domain: &str, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.current.set(domain, key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip_save_and_load() {
        let mut store = Store::default();
        store.set("config", "debug", "1");

        let mut buf = Vec::new();
        save(&store, &mut buf).unwrap();
        let loaded = load(Cursor::new(&buf)).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn load_malformed_json() {
        assert!(matches!(
            load(Cursor::new(b"{{{")),
            Err(PreferenceError::Serde(_))
        ));
    }

    #[test]
    fn file_preferences_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let prefs = FilePreferences::open(&path).unwrap();
        assert!(prefs.current().domains.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn file_preferences_persist_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = FilePreferences::open(&path).unwrap();
        prefs.set("config", "ssid", "home").unwrap();
        drop(prefs);

        let prefs = FilePreferences::open(&path).unwrap();
        assert_eq!(prefs.get("config", "ssid").as_deref(), Some("home"));
        assert_eq!(prefs.get("other", "ssid"), None);
    }

    #[test]
    fn memory_preferences_overwrite() {
        let mut prefs = MemoryPreferences::default();
        prefs.set("config", "k", "1").unwrap();
        prefs.set("config", "k", "2").unwrap();
        assert_eq!(prefs.get("config", "k").as_deref(), Some("2"));
    }
}
