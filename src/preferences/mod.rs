//! User preferences, loaded local-first and reconciled with the backend.
//!
//! The local copy gives an immediate value at startup; the remote copy wins
//! whenever it exists and overwrites the local cache.

pub mod local;

pub use local::{FileLocalStore, LocalStore};

use std::str::FromStr;
use std::sync::Arc;

use crate::core::config::LlmConfig;
use crate::core::errors::PreferencesError;
use crate::core::ids::UserId;
use crate::core::models::{ChatStyle, UserPreferences};
use crate::persistence::PersistenceGateway;

/// Preference access for one account.
pub struct PreferenceStore {
    local: Arc<dyn LocalStore>,
    gateway: Arc<dyn PersistenceGateway>,
    owner: UserId,
}

impl PreferenceStore {
    /// Create a store for `owner`.
    pub fn new(
        local: Arc<dyn LocalStore>,
        gateway: Arc<dyn PersistenceGateway>,
        owner: UserId,
    ) -> Self {
        Self {
            local,
            gateway,
            owner,
        }
    }

    /// Preferences from the local cache; unknown values fall back to defaults.
    #[must_use]
    pub fn load_local(&self) -> UserPreferences {
        let chat_style = self
            .local
            .get(local::CHAT_STYLE)
            .and_then(|style| ChatStyle::from_str(&style).ok())
            .unwrap_or_default();
        let bot_avatar = self
            .local
            .get(local::BOT_AVATAR)
            .filter(|url| !url.trim().is_empty());
        UserPreferences {
            chat_style,
            bot_avatar,
        }
    }

    /// Fetch the remote copy; it replaces the local cache when present.
    ///
    /// An unreachable backend keeps the local values.
    ///
    /// # Errors
    /// Returns an error if the local cache cannot be written.
    pub async fn reconcile(&self) -> Result<UserPreferences, PreferencesError> {
        match self.gateway.load_preferences(self.owner).await {
            Ok(Some(remote)) => {
                self.write_local(&remote)?;
                Ok(remote)
            }
            Ok(None) => Ok(self.load_local()),
            Err(err) => {
                tracing::warn!("Failed to load remote preferences, keeping local copy: {err}");
                Ok(self.load_local())
            }
        }
    }

    /// Write locally, then remotely.
    ///
    /// # Errors
    /// Returns an error if either write fails; the local copy is kept.
    pub async fn save(&self, preferences: &UserPreferences) -> Result<(), PreferencesError> {
        self.write_local(preferences)?;
        self.gateway
            .save_preferences(self.owner, preferences)
            .await?;
        Ok(())
    }

    fn write_local(&self, preferences: &UserPreferences) -> Result<(), PreferencesError> {
        self.local
            .set(local::CHAT_STYLE, preferences.chat_style.as_str())?;
        match preferences.bot_avatar.as_deref() {
            Some(url) => self.local.set(local::BOT_AVATAR, url),
            None => self.local.remove(local::BOT_AVATAR),
        }
    }

    /// Stored Gemini API key for direct-key mode.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.local
            .get(local::GEMINI_API_KEY)
            .filter(|key| !key.trim().is_empty())
    }

    /// Store or clear the Gemini API key.
    ///
    /// # Errors
    /// Returns an error if the local store cannot be written.
    pub fn set_api_key(&self, key: Option<&str>) -> Result<(), PreferencesError> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => self.local.set(local::GEMINI_API_KEY, key),
            None => self.local.remove(local::GEMINI_API_KEY),
        }
    }

    /// `config` with the stored API key applied, enabling direct-key mode.
    #[must_use]
    pub fn apply_api_key(&self, config: LlmConfig) -> LlmConfig {
        match self.api_key() {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    /// UI platform preference.
    #[must_use]
    pub fn ui_platform(&self) -> Option<String> {
        self.local.get(local::UI_PLATFORM)
    }

    /// Store the UI platform preference.
    ///
    /// # Errors
    /// Returns an error if the local store cannot be written.
    pub fn set_ui_platform(&self, platform: &str) -> Result<(), PreferencesError> {
        self.local.set(local::UI_PLATFORM, platform)
    }
}
