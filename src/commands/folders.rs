use tauri::State;

use crate::commands::{item_result, WorkspaceState};
use crate::models::ApiResult;

/// Creates a folder named "New Folder" (or "New Folder 1", ...) and selects it.
///
/// # Arguments
/// * `parent_id` - Folder to create it in; the top level (or the opened
///   directory's root) when absent
#[tauri::command]
pub async fn create_folder(
    parent_id: Option<String>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.create_folder(parent_id.as_deref()).await {
        Ok(id) => Ok(item_result(&workspace, &id)),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Moves an item (and everything below it) into another folder.
///
/// # Arguments
/// * `item_id` - The item to move
/// * `target_parent_id` - Destination folder, or absent for the top level
#[tauri::command]
pub async fn move_item(
    item_id: String,
    target_parent_id: Option<String>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.move_item(&item_id, target_parent_id.as_deref()).await {
        Ok(()) => Ok(item_result(&workspace, &item_id)),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}
