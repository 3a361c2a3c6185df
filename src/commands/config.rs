use tauri::State;

use crate::config::{Preferences, PreferencesManager, PreviewMode};
use crate::models::ApiResult;

/// Gets the current preferences.
#[tauri::command]
pub async fn get_preferences(
    preferences: State<'_, PreferencesManager>,
) -> Result<Preferences, String> {
    Ok(preferences.get())
}

/// Replaces the preferences and schedules a save.
///
/// # Arguments
/// * `updated` - The full preferences object; the pane split is clamped
#[tauri::command]
pub async fn set_preferences(
    updated: Preferences,
    preferences: State<'_, PreferencesManager>,
) -> Result<ApiResult, String> {
    preferences.update_and_save(|prefs| *prefs = updated).await;
    Ok(ApiResult::success())
}

/// Switches split → editor → preview → split and returns the new mode.
#[tauri::command]
pub async fn cycle_preview_mode(
    preferences: State<'_, PreferencesManager>,
) -> Result<PreviewMode, String> {
    Ok(preferences.cycle_preview_mode().await)
}

/// Restores the default theme.
#[tauri::command]
pub async fn reset_theme(preferences: State<'_, PreferencesManager>) -> Result<Preferences, String> {
    preferences.reset_theme().await;
    Ok(preferences.get())
}
