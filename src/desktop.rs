//! Filesystem mirror for the desktop shell: the local disk plus a native folder picker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tauri::{AppHandle, Runtime};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;

use crate::mirror::{FilesystemMirror, LocalMirror};
use crate::models::Item;

pub struct DesktopMirror<R: Runtime> {
    app: AppHandle<R>,
    local: LocalMirror,
}

impl<R: Runtime> DesktopMirror<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self {
            app,
            local: LocalMirror::new(),
        }
    }
}

#[async_trait]
impl<R: Runtime> FilesystemMirror for DesktopMirror<R> {
    async fn pick_directory(&self) -> Option<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.app.dialog().file().pick_folder(move |folder| {
            let _ = tx.send(folder);
        });

        let folder = rx.await.ok().flatten()?;
        match folder.into_path() {
            Ok(path) => Some(path),
            Err(e) => {
                log::error!("Folder picker returned an unusable path: {}", e);
                None
            }
        }
    }

    async fn list_directory(&self, path: &Path) -> Option<Vec<Item>> {
        self.local.list_directory(path).await
    }

    async fn read_file(&self, path: &Path) -> Option<String> {
        self.local.read_file(path).await
    }

    async fn write_file(&self, path: &Path, text: &str) -> bool {
        self.local.write_file(path, text).await
    }

    async fn make_directory(&self, path: &Path) -> bool {
        self.local.make_directory(path).await
    }

    async fn delete_entry(&self, path: &Path) -> bool {
        self.local.delete_entry(path).await
    }

    async fn rename_entry(&self, old_path: &Path, new_path: &Path) -> bool {
        self.local.rename_entry(old_path, new_path).await
    }
}
