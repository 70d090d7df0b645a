//! Settings service
//!
//! Holds user preferences (sort order, layout, font size) and the theme
//! preference. The note query reads the sort order from here.

use crate::config::{THEME_KEY, USER_SETTINGS_KEY};
use crate::storage::{load_json, KeyValueStore, SnapshotWriter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Text size used by note editors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Average,
    Large,
    Huge,
}

/// Timestamp notes are ordered by, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    CreationDate,
    #[default]
    ModificationDate,
}

/// How note lists are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    List,
    #[default]
    Grid,
}

/// User preferences persisted under the `userSettings` key
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub font_size: FontSize,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub layout: Layout,
}

/// Partial update merged over the current settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettingsPatch {
    pub font_size: Option<FontSize>,
    pub sort_order: Option<SortOrder>,
    pub layout: Option<Layout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

/// Theme preference. `system` follows the platform appearance and wins over `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSettings {
    #[serde(default)]
    pub mode: ThemeMode,
    #[serde(default)]
    pub system: bool,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Dark,
            system: true,
        }
    }
}

struct SettingsState {
    user: UserSettings,
    theme: ThemeSettings,
}

/// Passive settings holder backed by snapshot persistence
#[derive(Clone)]
pub struct SettingsStore {
    state: Arc<RwLock<SettingsState>>,
    writer: SnapshotWriter,
}

impl SettingsStore {
    /// Load settings, writing defaults for anything missing
    pub async fn load(store: &dyn KeyValueStore, writer: SnapshotWriter) -> Self {
        let user = match load_json::<UserSettings>(store, USER_SETTINGS_KEY).await {
            Some(user) => user,
            None => {
                tracing::info!("User settings not found, creating default settings");
                let default = UserSettings::default();
                writer.persist(USER_SETTINGS_KEY, &default);
                default
            }
        };

        let theme = match load_json::<ThemeSettings>(store, THEME_KEY).await {
            Some(theme) => theme,
            None => {
                tracing::info!("Theme preference not found, following system theme");
                let default = ThemeSettings::default();
                writer.persist(THEME_KEY, &default);
                default
            }
        };

        Self {
            state: Arc::new(RwLock::new(SettingsState { user, theme })),
            writer,
        }
    }

    pub async fn user_settings(&self) -> UserSettings {
        self.state.read().await.user.clone()
    }

    pub async fn sort_order(&self) -> SortOrder {
        self.state.read().await.user.sort_order
    }

    /// Merge `patch` into the current settings and persist the result
    pub async fn update(&self, patch: UserSettingsPatch) -> UserSettings {
        let mut state = self.state.write().await;

        if let Some(font_size) = patch.font_size {
            state.user.font_size = font_size;
        }
        if let Some(sort_order) = patch.sort_order {
            state.user.sort_order = sort_order;
        }
        if let Some(layout) = patch.layout {
            state.user.layout = layout;
        }

        self.writer.persist(USER_SETTINGS_KEY, &state.user);
        tracing::info!("User settings updated: {:?}", state.user);

        state.user.clone()
    }

    pub async fn theme(&self) -> ThemeSettings {
        self.state.read().await.theme
    }

    pub async fn update_theme(&self, theme: ThemeSettings) {
        let mut state = self.state.write().await;
        state.theme = theme;
        self.writer.persist(THEME_KEY, &state.theme);
        tracing::info!("Theme preference updated: {:?}", theme);
    }
}
