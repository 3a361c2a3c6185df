use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an item in the note tree.
pub type ItemId = String;

/// Identifier of the folder that wraps an opened directory.
pub const ROOT_ID: &str = "fs-root";

/// Default title for new notes (without the `.md` suffix).
pub const UNTITLED: &str = "Untitled";

/// Default title for new folders.
pub const NEW_FOLDER: &str = "New Folder";

/// Suffix enforced on every file title.
pub const MARKDOWN_EXT: &str = ".md";

/// A file, folder or image in the note tree.
///
/// The wire format matches what the web front-end keeps in storage:
/// camelCase keys, a `type` tag, and `fsPath` for mirrored entries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub title: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    /// Present when the item is backed by a real file or directory.
    #[serde(rename = "fsPath", default, skip_serializing_if = "Option::is_none")]
    pub external_path: Option<PathBuf>,
    #[serde(flatten)]
    pub kind: ItemKind,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Folder {
        #[serde(rename = "isOpen", default)]
        is_open: bool,
    },
    File {
        /// Absent until loaded when the file lives in a mirrored directory.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    Image,
}

impl Item {
    pub fn file(
        id: impl Into<ItemId>,
        title: impl Into<String>,
        parent_id: Option<ItemId>,
        content: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            title: title.into(),
            last_modified: Utc::now(),
            external_path: None,
            kind: ItemKind::File { content },
        }
    }

    pub fn folder(
        id: impl Into<ItemId>,
        title: impl Into<String>,
        parent_id: Option<ItemId>,
        is_open: bool,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            title: title.into(),
            last_modified: Utc::now(),
            external_path: None,
            kind: ItemKind::Folder { is_open },
        }
    }

    pub fn image(id: impl Into<ItemId>, title: impl Into<String>, parent_id: Option<ItemId>, path: PathBuf) -> Self {
        Self {
            id: id.into(),
            parent_id,
            title: title.into(),
            last_modified: Utc::now(),
            external_path: Some(path),
            kind: ItemKind::Image,
        }
    }

    pub fn with_external_path(mut self, path: PathBuf) -> Self {
        self.external_path = Some(path);
        self
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder { .. })
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ItemKind::Image)
    }

    pub fn is_mirrored(&self) -> bool {
        self.external_path.is_some()
    }

    /// Loaded text of a file item.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File { content } => content.as_deref(),
            _ => None,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// An entry of the recently opened directories list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecentWorkspace {
    pub name: String,
    pub path: PathBuf,
}

/// Generic API result for IPC commands
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl ApiResult {
    /// Create a successful result
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Create a success result carrying the affected item
    pub fn with_item(item: &Item) -> Self {
        Self {
            success: true,
            item_id: Some(item.id.clone()),
            title: Some(item.title.clone()),
            ..Default::default()
        }
    }
}
