use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{NoteError, Result};
use crate::persistence::KeyValueStore;

pub const THEME_KEY: &str = "app-theme";
pub const PREVIEW_MODE_KEY: &str = "preview-mode";
pub const PANE_SPLIT_KEY: &str = "pane-split";
pub const LANGUAGE_KEY: &str = "app-lang";

/// Debounce delay for preference saves (1 second)
const SAVE_DEBOUNCE_MS: u64 = 1000;

/// Bounds for the editor/preview divider, as a fraction of the editor width.
pub const MIN_PANE_SPLIT: f64 = 0.15;
pub const MAX_PANE_SPLIT: f64 = 0.85;

/// Appearance settings, stored as one JSON object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    /// "dark" or "light"
    pub mode: String,
    /// HSL triple without the `hsl()` wrapper, e.g. "142,65%,48%"
    pub accent: String,
    pub editor_font: String,
    pub font_size: u32,
    pub line_height: f64,
    pub anim_bg: String,
    pub lite_mode: bool,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: "dark".to_string(),
            accent: "142,65%,48%".to_string(),
            editor_font: "'Fira Code', monospace".to_string(),
            font_size: 15,
            line_height: 1.75,
            anim_bg: "aurora".to_string(),
            lite_mode: false,
        }
    }
}

/// Which panes are visible.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    #[default]
    Split,
    Editor,
    Preview,
}

impl PreviewMode {
    /// split → editor → preview → split
    pub fn next(self) -> Self {
        match self {
            PreviewMode::Split => PreviewMode::Editor,
            PreviewMode::Editor => PreviewMode::Preview,
            PreviewMode::Preview => PreviewMode::Split,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PreviewMode::Split => "split",
            PreviewMode::Editor => "editor",
            PreviewMode::Preview => "preview",
        }
    }
}

impl FromStr for PreviewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "split" => Ok(PreviewMode::Split),
            "editor" => Ok(PreviewMode::Editor),
            "preview" => Ok(PreviewMode::Preview),
            other => Err(format!("unknown preview mode '{}'", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: ThemeSettings,
    pub preview_mode: PreviewMode,
    pub pane_split: f64,
    pub language: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: ThemeSettings::default(),
            preview_mode: PreviewMode::default(),
            pane_split: 0.5,
            language: "en".to_string(),
        }
    }
}

/// PreferencesManager loads, updates and persists user preferences.
///
/// Reads are served from memory. Writes go to the key-value store either
/// immediately ([`PreferencesManager::save_sync`]) or after a debounce, so
/// dragging a slider does not rewrite the slots on every step.
pub struct PreferencesManager {
    prefs: Arc<RwLock<Preferences>>,
    store: Arc<dyn KeyValueStore>,
    /// Handle to the debounced save task
    save_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PreferencesManager {
    /// Loads preferences from `store`, filling anything missing with defaults.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let prefs = load_preferences(store.as_ref())?;
        Ok(Self {
            prefs: Arc::new(RwLock::new(prefs)),
            store,
            save_handle: Mutex::new(None),
        })
    }

    /// Gets a clone of the current preferences.
    pub fn get(&self) -> Preferences {
        self.prefs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Updates preferences in memory. The pane split is kept within bounds.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Preferences),
    {
        let mut prefs = self.prefs.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut prefs);
        prefs.pane_split = clamp_split(prefs.pane_split);
    }

    /// Schedules a debounced save operation.
    ///
    /// If a save is already scheduled, it is cancelled and a new one is
    /// scheduled. The save happens after SAVE_DEBOUNCE_MS milliseconds.
    pub async fn schedule_save(&self) {
        let mut handle_guard = self.save_handle.lock().await;

        if let Some(handle) = handle_guard.take() {
            handle.abort();
        }

        let prefs_ref = Arc::clone(&self.prefs);
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(SAVE_DEBOUNCE_MS)).await;

            let prefs = prefs_ref.read().unwrap_or_else(PoisonError::into_inner).clone();
            if let Err(e) = write_preferences(store.as_ref(), &prefs) {
                log::error!("Failed to save preferences: {}", e);
            }
        });

        *handle_guard = Some(handle);
    }

    /// Updates preferences and schedules a debounced save.
    pub async fn update_and_save<F>(&self, f: F)
    where
        F: FnOnce(&mut Preferences),
    {
        self.update(f);
        self.schedule_save().await;
    }

    /// Saves the preferences immediately.
    pub fn save_sync(&self) -> Result<()> {
        let prefs = self.get();
        write_preferences(self.store.as_ref(), &prefs)
    }

    /// Advances split → editor → preview → split and returns the new mode.
    pub async fn cycle_preview_mode(&self) -> PreviewMode {
        let mut mode = PreviewMode::default();
        self.update_and_save(|prefs| {
            prefs.preview_mode = prefs.preview_mode.next();
            mode = prefs.preview_mode;
        })
        .await;
        mode
    }

    /// Restores the default theme, leaving pane layout and language alone.
    pub async fn reset_theme(&self) {
        self.update_and_save(|prefs| prefs.theme = ThemeSettings::default())
            .await;
    }
}

fn clamp_split(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(MIN_PANE_SPLIT, MAX_PANE_SPLIT)
    } else {
        Preferences::default().pane_split
    }
}

fn load_preferences(store: &dyn KeyValueStore) -> Result<Preferences> {
    let mut prefs = Preferences::default();

    if let Some(raw) = store.get(THEME_KEY)? {
        prefs.theme = merge_theme_with_defaults(&raw)?;
    }
    if let Some(raw) = store.get(PREVIEW_MODE_KEY)? {
        match raw.parse() {
            Ok(mode) => prefs.preview_mode = mode,
            Err(e) => log::warn!("ignoring saved preview mode: {}", e),
        }
    }
    if let Some(raw) = store.get(PANE_SPLIT_KEY)? {
        match raw.trim().parse::<f64>() {
            Ok(ratio) => prefs.pane_split = clamp_split(ratio),
            Err(_) => log::warn!("ignoring saved pane split '{}'", raw),
        }
    }
    if let Some(raw) = store.get(LANGUAGE_KEY)? {
        if !raw.trim().is_empty() {
            prefs.language = raw.trim().to_string();
        }
    }

    Ok(prefs)
}

fn write_preferences(store: &dyn KeyValueStore, prefs: &Preferences) -> Result<()> {
    store.set(THEME_KEY, &serde_json::to_string(&prefs.theme)?)?;
    store.set(PREVIEW_MODE_KEY, prefs.preview_mode.as_str())?;
    store.set(PANE_SPLIT_KEY, &prefs.pane_split.to_string())?;
    store.set(LANGUAGE_KEY, &prefs.language)?;
    log::debug!("preferences saved");
    Ok(())
}

/// Merges a partial theme JSON object with defaults.
///
/// Keys that are missing, or whose value has the wrong type, keep their
/// default. A value that is not a JSON object at all is an error.
pub fn merge_theme_with_defaults(partial_json: &str) -> Result<ThemeSettings> {
    if partial_json.trim().is_empty() {
        return Ok(ThemeSettings::default());
    }

    let json_value: serde_json::Value = serde_json::from_str(partial_json)?;
    let obj = json_value
        .as_object()
        .ok_or_else(|| NoteError::Storage("theme is not a JSON object".to_string()))?;

    let mut theme = ThemeSettings::default();

    if let Some(v) = obj.get("mode").and_then(|v| v.as_str()) {
        theme.mode = v.to_string();
    }
    if let Some(v) = obj.get("accent").and_then(|v| v.as_str()) {
        theme.accent = v.to_string();
    }
    if let Some(v) = obj.get("editorFont").and_then(|v| v.as_str()) {
        theme.editor_font = v.to_string();
    }
    if let Some(v) = obj.get("fontSize").and_then(|v| v.as_u64()) {
        theme.font_size = u32::try_from(v).unwrap_or(theme.font_size);
    }
    if let Some(v) = obj.get("lineHeight").and_then(|v| v.as_f64()) {
        theme.line_height = v;
    }
    if let Some(v) = obj.get("animBg").and_then(|v| v.as_str()) {
        theme.anim_bg = v.to_string();
    }
    if let Some(v) = obj.get("liteMode").and_then(|v| v.as_bool()) {
        theme.lite_mode = v;
    }

    Ok(theme)
}
