use tauri::State;

use crate::commands::WorkspaceState;
use crate::models::ApiResult;

/// Stores a pasted or dropped image.
///
/// Returns the new image id and, in `content`, the markdown to insert at the
/// cursor. The image is dropped again by the next autosave unless a note
/// references it by then.
///
/// # Arguments
/// * `data_url` - The (already resized) image as a base64 data URL
/// * `alt` - Alt text; "image" when blank
/// * `width` - Optional display width in pixels
#[tauri::command]
pub async fn insert_image(
    data_url: String,
    alt: String,
    width: Option<u32>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.insert_image(&data_url, &alt, width) {
        Ok(image) => Ok(ApiResult {
            image_id: Some(image.id),
            content: Some(image.markdown),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}

/// Resolves `img://` references so the front-end can hand the result to its
/// markdown renderer.
#[tauri::command]
pub async fn render_preview(
    markdown: String,
    workspace: State<'_, WorkspaceState>,
) -> Result<String, String> {
    Ok(workspace.lock().await.render_preview(&markdown))
}

/// Stores an image from raw bytes, e.g. a file dropped from the desktop.
///
/// Same result as [`insert_image`].
///
/// # Arguments
/// * `mime` - Media type such as `image/png`
/// * `bytes` - The image file contents
#[tauri::command]
pub async fn insert_image_bytes(
    mime: String,
    bytes: Vec<u8>,
    alt: String,
    width: Option<u32>,
    workspace: State<'_, WorkspaceState>,
) -> Result<ApiResult, String> {
    let mut workspace = workspace.lock().await;
    match workspace.insert_image_bytes(&mime, &bytes, &alt, width) {
        Ok(image) => Ok(ApiResult {
            image_id: Some(image.id),
            content: Some(image.markdown),
            ..ApiResult::success()
        }),
        Err(e) => Ok(ApiResult::error(e.to_string())),
    }
}
