//! Local key/value storage for client preferences.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::core::errors::PreferencesError;

/// Key holding the Gemini API key for direct-key mode.
pub const GEMINI_API_KEY: &str = "gemini_api_key";
/// Key holding the chat layout style.
pub const CHAT_STYLE: &str = "chat_style";
/// Key holding the bot avatar URL.
pub const BOT_AVATAR: &str = "bot_avatar";
/// Key holding the UI platform preference.
pub const UI_PLATFORM: &str = "ui_platform";

/// Flat string storage, the equivalent of browser local storage.
pub trait LocalStore: Send + Sync {
    /// Value under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError>;

    /// Remove `key`.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), PreferencesError>;
}

/// JSON object file holding string pairs; rewritten on every change.
pub struct FileLocalStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    /// Open `path`, starting empty when the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), PreferencesError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut entries);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&*entries)?)?;
        Ok(())
    }
}

impl LocalStore for FileLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), PreferencesError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("local.json");

        let store = FileLocalStore::open(&path).unwrap();
        assert_eq!(store.get(CHAT_STYLE), None);
        store.set(CHAT_STYLE, "compact").unwrap();
        store.set(UI_PLATFORM, "mac").unwrap();
        store.remove(UI_PLATFORM).unwrap();

        let reopened = FileLocalStore::open(&path).unwrap();
        assert_eq!(reopened.get(CHAT_STYLE).as_deref(), Some("compact"));
        assert_eq!(reopened.get(UI_PLATFORM), None);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileLocalStore::open(&path),
            Err(PreferencesError::Serialization(_))
        ));
    }
}
