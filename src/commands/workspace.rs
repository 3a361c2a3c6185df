use std::path::{Path, PathBuf};

use tauri::State;

use crate::commands::WorkspaceState;
use crate::models::{ApiResult, RecentWorkspace};

fn opened(count: usize) -> ApiResult {
    ApiResult {
        count: Some(count),
        ..ApiResult::success()
    }
}

/// Shows the native folder picker and opens the chosen directory.
///
/// A cancelled picker is still a success, without a `count`.
#[tauri::command]
pub async fn pick_directory(workspace: State<'_, WorkspaceState>) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.pick_and_open().await {
        Ok(true) => Ok(opened(workspace.items().len())),
        Ok(false) => Ok(ApiResult::success()),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Opens a directory by path, replacing the current collection.
#[tauri::command]
pub async fn open_workspace(
    path: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.open_directory(&PathBuf::from(path)).await {
        Ok(()) => Ok(opened(workspace.items().len())),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Reopens an entry of the recent list.
///
/// # Arguments
/// * `index` - Position in the list returned by `list_recent_workspaces`
#[tauri::command]
pub async fn open_recent_workspace(
    index: usize,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    let recent = workspace
        .persistence()
        .recent_workspaces()
        .map_err(|e| e.to_string())?;
    let Some(entry) = recent.into_iter().nth(index) else {
        return Ok(ApiResult::error(format!("No recent workspace at position {}", index)));
    };
    match workspace.open_directory(&entry.path).await {
        Ok(()) => Ok(opened(workspace.items().len())),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Recently opened directories, most recent first.
#[tauri::command]
pub async fn list_recent_workspaces(
    workspace: State<'_, WorkspaceState>,
) -> Result<Vec<RecentWorkspace>, String> {
    workspace
        .lock()
        .await
        .persistence()
        .recent_workspaces()
        .map_err(|e| e.to_string())
}

/// Explicit save (Ctrl+S in the front-end).
#[tauri::command]
pub async fn save_workspace(workspace: State<'_, WorkspaceState>) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.save() {
        Ok(()) => Ok(ApiResult {
            status: Some(workspace.save_status().label()),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Text for the save indicator. The front-end polls this.
#[tauri::command]
pub async fn get_save_status(workspace: State<'_, WorkspaceState>) -> Result<String, String> {
    Ok(workspace.lock().await.save_status().label())
}

/// Path of the note whose last disk write failed, if any.
///
/// Such a failure comes after the change was saved, so the command that
/// caused it still reported success.
#[tauri::command]
pub async fn get_unsynced_note(workspace: State<'_, WorkspaceState>) -> Result<Option<PathBuf>, String> {
    Ok(workspace.lock().await.unsynced_note().map(Path::to_path_buf))
}
