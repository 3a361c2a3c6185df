pub mod config;
pub mod folders;
pub mod images;
pub mod notes;
pub mod workspace;

pub use config::*;
pub use folders::*;
pub use images::*;
pub use notes::*;
pub use workspace::*;

use crate::models::ApiResult;
use crate::workspace::Workspace;

/// Managed state for the open workspace. Commands are serialized through the lock.
pub type WorkspaceState = tokio::sync::Mutex<Workspace>;

/// Success envelope describing `id`, or a bare success if it no longer exists.
fn item_result(workspace: &Workspace, id: &str) -> ApiResult {
    workspace
        .items()
        .get(id)
        .map(ApiResult::with_item)
        .unwrap_or_else(ApiResult::success)
}
