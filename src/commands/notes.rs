use tauri::State;

use crate::commands::{item_result, WorkspaceState};
use crate::models::{ApiResult, Item};

/// Lists every item in the tree.
///
/// Notes from an opened directory come back without `content` until they
/// have been loaded.
#[tauri::command]
pub async fn list_items(workspace: State<'_, WorkspaceState>) -> Result<Vec<Item>, String> {
    Ok(workspace.lock().await.items().to_vec())
}

/// Returns the active item, reading its content from disk on first use.
#[tauri::command]
pub async fn load_active_item(workspace: State<'_, WorkspaceState>) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.load_active().await {
        Ok(content) => {
            let mut result = match workspace.current_item() {
                Some(item) => ApiResult::with_item(item),
                None => ApiResult::success(),
            };
            result.content = content;
            Ok(result)
        }
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Creates an empty note and makes it active.
///
/// # Arguments
/// * `parent_id` - Folder to create the note in; the top level (or the
///   opened directory's root) when absent
#[tauri::command]
pub async fn create_note(
    parent_id: Option<String>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.create_note(parent_id.as_deref()).await {
        Ok(id) => Ok(item_result(&workspace, &id)),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Deletes a note, or a folder with everything inside it.
///
/// Deleting the last remaining note is refused.
#[tauri::command]
pub async fn delete_item(
    item_id: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.delete(&item_id).await {
        Ok(()) => Ok(ApiResult::success()),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Deletes a multi-selection in order, stopping at the first failure.
///
/// On failure the error names the item that could not be deleted; items
/// before it in the selection stay deleted.
#[tauri::command]
pub async fn delete_items(
    item_ids: Vec<String>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.delete_many(&item_ids).await {
        Ok(count) => Ok(ApiResult {
            count: Some(count),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Renames an item.
///
/// # Arguments
/// * `item_id` - The item to rename
/// * `title` - The requested title; it is trimmed, `.md` is added for notes,
///   and a numeric suffix is appended if a sibling already uses it
#[tauri::command]
pub async fn rename_item(
    item_id: String,
    title: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.rename(&item_id, &title).await {
        Ok(applied) => Ok(ApiResult {
            item_id: Some(item_id),
            title: Some(applied),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Replaces a note's text. Called from the editor on every change.
#[tauri::command]
pub async fn update_content(
    item_id: String,
    content: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.update_content(&item_id, &content).await {
        Ok(()) => Ok(ApiResult::success()),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Selects an item in the sidebar and returns it with its content.
#[tauri::command]
pub async fn activate_item(
    item_id: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    if let Err(e) = workspace.activate(&item_id).await {
        return Ok(ApiResult::error(e.to_string()));
    }
    let mut result = item_result(&workspace, &item_id);
    result.content = workspace
        .current_item()
        .and_then(Item::content)
        .map(str::to_string);
    Ok(result)
}

/// Adds an uploaded markdown file as a new note.
///
/// # Arguments
/// * `file_name` - Name of the uploaded file; `.md` is added if missing
/// * `content` - The file's text
/// * `parent_id` - Destination folder, or absent for the top level
#[tauri::command]
pub async fn import_note(
    file_name: String,
    content: String,
    parent_id: Option<String>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace
        .import_note(&file_name, &content, parent_id.as_deref())
        .await
    {
        Ok(id) => Ok(item_result(&workspace, &id)),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Returns a note's title and text so the front-end can offer a download.
#[tauri::command]
pub async fn export_note(
    item_id: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let workspace = workspace.lock().await;
    match workspace.export_note(&item_id).await {
        Ok((title, content)) => Ok(ApiResult {
            item_id: Some(item_id),
            title: Some(title),
            content: Some(content),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}
