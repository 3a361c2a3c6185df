//! The note workspace: the item tree plus everything that keeps it saved.
//!
//! Every mutation follows the same order. Validate first, then perform the
//! external filesystem step (if the item is mirrored), then commit the change
//! in memory, then autosave. When the external step fails nothing in memory
//! changes and the caller gets [`NoteError::Mirror`]. The autosave's own disk
//! write comes after the commit and only gets logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::error::{NoteError, Result};
use crate::images::{markdown_reference, ImageStore};
use crate::mirror::{path_id, validate_component, FilesystemMirror};
use crate::models::{Item, ItemId, ItemKind, MARKDOWN_EXT, NEW_FOLDER, ROOT_ID, UNTITLED};
use crate::persistence::{Persistence, SaveStatus};
use crate::tree::{has_markdown_ext, ItemStore};

/// An image stored by [`Workspace::insert_image`] and the markdown that embeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedImage {
    pub id: String,
    pub markdown: String,
}

pub struct Workspace {
    store: ItemStore,
    current_item_id: Option<ItemId>,
    images: ImageStore,
    persistence: Persistence,
    mirror: Option<Arc<dyn FilesystemMirror>>,
    status: SaveStatus,
    unsynced: Option<PathBuf>,
}

impl Workspace {
    /// Loads the last saved snapshot (or the seed collection).
    pub fn open(persistence: Persistence, mirror: Option<Arc<dyn FilesystemMirror>>) -> Result<Self> {
        let snapshot = persistence.load()?;
        let store = ItemStore::from_items(snapshot.items)?;
        log::info!(
            "workspace loaded with {} item(s) and {} image(s)",
            store.len(),
            snapshot.images.len()
        );
        Ok(Self {
            store,
            current_item_id: snapshot.current_item_id,
            images: snapshot.images,
            persistence,
            mirror,
            status: SaveStatus::Idle,
            unsynced: None,
        })
    }

    pub fn items(&self) -> &ItemStore {
        &self.store
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn current_item_id(&self) -> Option<&str> {
        self.current_item_id.as_deref()
    }

    pub fn current_item(&self) -> Option<&Item> {
        self.current_item_id.as_deref().and_then(|id| self.store.get(id))
    }

    /// True when the collection is an opened directory.
    pub fn is_mirrored(&self) -> bool {
        self.store.get(ROOT_ID).is_some_and(Item::is_mirrored)
    }

    /// Current save indicator, with the "Saved" flash expired if due.
    pub fn save_status(&mut self) -> SaveStatus {
        self.status = self.status.tick(Utc::now());
        self.status
    }

    fn mirror(&self) -> Result<Arc<dyn FilesystemMirror>> {
        self.mirror.clone().ok_or(NoteError::NoMirror)
    }

    /// Maps a requested parent to the one actually used.
    ///
    /// `None` means the workspace root when a directory is open.
    fn resolve_parent(&self, parent_id: Option<&str>) -> Result<Option<ItemId>> {
        match parent_id {
            Some(id) => {
                self.store.folder(id)?;
                Ok(Some(id.to_string()))
            }
            None if self.store.contains(ROOT_ID) => Ok(Some(ROOT_ID.to_string())),
            None => Ok(None),
        }
    }

    fn external_dir(&self, parent_id: Option<&str>) -> Option<PathBuf> {
        parent_id
            .and_then(|id| self.store.get(id))
            .and_then(|parent| parent.external_path.clone())
    }

    pub async fn create_note(&mut self, parent_id: Option<&str>) -> Result<ItemId> {
        let parent_id = self.resolve_parent(parent_id)?;
        let base = format!("{}{}", UNTITLED, MARKDOWN_EXT);
        let title = self.store.unique_title(&base, parent_id.as_deref(), true, None);
        let item = Item::file(uuid::Uuid::new_v4().to_string(), title, parent_id, Some(String::new()));
        self.add_created(item, "").await
    }

    pub async fn create_folder(&mut self, parent_id: Option<&str>) -> Result<ItemId> {
        let parent_id = self.resolve_parent(parent_id)?;
        let title = self.store.unique_title(NEW_FOLDER, parent_id.as_deref(), false, None);
        let item = Item::folder(uuid::Uuid::new_v4().to_string(), title, parent_id, true);
        self.add_created(item, "").await
    }

    /// Adds a file with the given name and content, e.g. from an upload.
    pub async fn import_note(
        &mut self,
        file_name: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<ItemId> {
        let parent_id = self.resolve_parent(parent_id)?;
        let mut base = match file_name.trim() {
            "" => UNTITLED.to_string(),
            name => name.to_string(),
        };
        if !has_markdown_ext(&base) {
            base.push_str(MARKDOWN_EXT);
        }
        let title = self.store.unique_title(&base, parent_id.as_deref(), true, None);
        let item = Item::file(
            uuid::Uuid::new_v4().to_string(),
            title,
            parent_id,
            Some(content.to_string()),
        );
        self.add_created(item, content).await
    }

    async fn add_created(&mut self, mut item: Item, initial: &str) -> Result<ItemId> {
        if let Some(dir) = self.external_dir(item.parent_id.as_deref()) {
            validate_component(&item.title).map_err(NoteError::refused)?;
            let mirror = self.mirror()?;
            let path = mirror.join_path(&dir, &item.title);
            if item.is_folder() {
                if !mirror.make_directory(&path).await {
                    return Err(NoteError::mirror("mkdir", path));
                }
            } else if !mirror.write_file(&path, initial).await {
                return Err(NoteError::mirror("write", path));
            }
            item = item.with_external_path(path);
        }

        let id = item.id.clone();
        log::debug!("created {} '{}'", id, item.title);
        self.store.insert(item)?;
        self.current_item_id = Some(id.clone());
        self.auto_save().await?;
        Ok(id)
    }

    /// Deletes an item, and for folders everything below it.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let item = self.store.require(id)?.clone();
        if id == ROOT_ID {
            return Err(NoteError::refused("the workspace root cannot be deleted"));
        }
        if item.is_file() && self.store.file_count() <= 1 {
            return Err(NoteError::refused("cannot delete the last note"));
        }

        if let Some(path) = &item.external_path {
            let mirror = self.mirror()?;
            if !mirror.delete_entry(path).await {
                return Err(NoteError::mirror("delete", path.clone()));
            }
        }

        let doomed = self.store.collect_descendants(id);
        let removed = self.store.remove_all(&doomed);
        log::info!("deleted '{}' ({} item(s))", item.title, removed.len());

        // the pointer must land on a surviving note
        if !self.current_item().is_some_and(Item::is_file) {
            self.current_item_id = self.store.first_file().map(|i| i.id.clone());
        }
        self.auto_save().await
    }

    /// Deletes each id that still exists, in order. Stops at the first error.
    ///
    /// Ids already removed by an earlier folder delete are skipped. Returns
    /// how many deletes were performed.
    pub async fn delete_many(&mut self, ids: &[ItemId]) -> Result<usize> {
        let mut deleted = 0;
        for id in ids {
            if !self.store.contains(id) {
                continue;
            }
            self.delete(id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Moves an item under `new_parent_id` (`None` for the top level).
    pub async fn move_item(&mut self, id: &str, new_parent_id: Option<&str>) -> Result<()> {
        let item = self.store.require(id)?.clone();
        if id == ROOT_ID {
            return Err(NoteError::refused("the workspace root cannot be moved"));
        }
        if let Some(target) = new_parent_id {
            if self.store.is_descendant_of(Some(target), id) {
                return Err(NoteError::refused(format!(
                    "cannot move '{}' into itself or one of its subfolders",
                    item.title
                )));
            }
            self.store.folder(target)?;
        }
        if item.parent_id.as_deref() == new_parent_id {
            return Ok(());
        }

        let title = self
            .store
            .unique_title(&item.title, new_parent_id, item.is_file(), Some(id));

        let mut relocated = None;
        if let Some(old_path) = &item.external_path {
            let target_dir = self.external_dir(new_parent_id).ok_or_else(|| {
                NoteError::refused("a file from the opened folder can only move into that folder")
            })?;
            validate_component(&title).map_err(NoteError::refused)?;
            let mirror = self.mirror()?;
            let new_path = mirror.join_path(&target_dir, &title);
            if !mirror.rename_entry(old_path, &new_path).await {
                return Err(NoteError::mirror("rename", old_path.clone()));
            }
            relocated = Some((old_path.clone(), new_path));
        }

        self.store.reparent(id, new_parent_id.map(str::to_string));
        self.commit_rename(id, title, relocated);
        self.auto_save().await
    }

    /// Renames an item and returns the title actually applied.
    ///
    /// Blank input falls back to "Untitled"; files always keep the `.md`
    /// suffix and a clash with a sibling gets a numeric suffix.
    pub async fn rename(&mut self, id: &str, raw_title: &str) -> Result<String> {
        let item = self.store.require(id)?.clone();
        if id == ROOT_ID {
            return Err(NoteError::refused("the workspace root cannot be renamed"));
        }

        let mut title = match raw_title.trim() {
            "" => UNTITLED.to_string(),
            trimmed => trimmed.to_string(),
        };
        if item.is_file() && !has_markdown_ext(&title) {
            title.push_str(MARKDOWN_EXT);
        }
        if title == item.title {
            return Ok(title);
        }
        let title = self
            .store
            .unique_title(&title, item.parent_id.as_deref(), item.is_file(), Some(id));
        if title == item.title {
            return Ok(title);
        }

        let mut relocated = None;
        if let Some(old_path) = &item.external_path {
            validate_component(&title).map_err(NoteError::refused)?;
            let dir = old_path
                .parent()
                .ok_or_else(|| NoteError::mirror("rename", old_path.clone()))?;
            let mirror = self.mirror()?;
            let new_path = mirror.join_path(dir, &title);
            if !mirror.rename_entry(old_path, &new_path).await {
                return Err(NoteError::mirror("rename", old_path.clone()));
            }
            relocated = Some((old_path.clone(), new_path));
        }

        self.commit_rename(id, title.clone(), relocated);
        self.auto_save().await?;
        Ok(title)
    }

    fn commit_rename(&mut self, id: &str, title: String, relocated: Option<(PathBuf, PathBuf)>) {
        if let Some((old_path, new_path)) = &relocated {
            self.store.rebase_external_paths(id, old_path, new_path);
        }
        if let Some(entry) = self.store.get_mut(id) {
            log::debug!("'{}' is now '{}'", entry.title, title);
            entry.title = title;
            entry.touch();
            if let Some((_, new_path)) = relocated {
                entry.external_path = Some(new_path);
            }
        }
    }

    /// Replaces a note's text and autosaves.
    ///
    /// A mirrored note is written to disk before the new text is committed.
    pub async fn update_content(&mut self, id: &str, text: &str) -> Result<()> {
        let item = self.store.require(id)?;
        if !item.is_file() {
            return Err(NoteError::refused(format!("'{}' is not a note", item.title)));
        }
        if let Some(path) = item.external_path.clone() {
            if !self.mirror()?.write_file(&path, text).await {
                return Err(NoteError::mirror("write", path));
            }
            if self.unsynced.as_ref() == Some(&path) {
                self.unsynced = None;
            }
        }

        if let Some(item) = self.store.get_mut(id) {
            if let ItemKind::File { content } = &mut item.kind {
                *content = Some(text.to_string());
            }
            item.touch();
        }
        self.save_tree()
    }

    /// Selects an item in the tree.
    ///
    /// Selecting the active folder again collapses or expands it; selecting
    /// another folder opens it. Notes have their content loaded.
    pub async fn activate(&mut self, id: &str) -> Result<()> {
        let item = self.store.require(id)?;
        if item.is_folder() {
            let open = if self.current_item_id.as_deref() == Some(id) {
                None
            } else {
                Some(true)
            };
            self.store.set_open(id, open);
        }
        self.current_item_id = Some(id.to_string());
        self.load_active().await?;
        self.persist()
    }

    /// Content of the active note, reading it through the mirror on first use.
    ///
    /// Returns `None` when nothing is active or the active item is not a note.
    /// A failed read leaves the note unloaded.
    pub async fn load_active(&mut self) -> Result<Option<String>> {
        let Some(id) = self.current_item_id.clone() else {
            return Ok(None);
        };
        let item = self.store.require(&id)?;
        if !item.is_file() {
            return Ok(None);
        }
        if let Some(text) = item.content() {
            return Ok(Some(text.to_string()));
        }

        let text = match item.external_path.clone() {
            Some(path) => {
                let mirror = self.mirror()?;
                mirror
                    .read_file(&path)
                    .await
                    .ok_or_else(|| NoteError::mirror("read", path))?
            }
            None => String::new(),
        };
        if let Some(Item {
            kind: ItemKind::File { content },
            ..
        }) = self.store.get_mut(&id)
        {
            *content = Some(text.clone());
        }
        Ok(Some(text))
    }

    /// Title and text of a note, for download.
    pub async fn export_note(&self, id: &str) -> Result<(String, String)> {
        let item = self.store.require(id)?;
        if !item.is_file() {
            return Err(NoteError::refused(format!("'{}' is not a note", item.title)));
        }
        let text = match (item.content(), &item.external_path) {
            (Some(text), _) => text.to_string(),
            (None, Some(path)) => self
                .mirror()?
                .read_file(path)
                .await
                .ok_or_else(|| NoteError::mirror("read", path.clone()))?,
            (None, None) => String::new(),
        };
        Ok((item.title.clone(), text))
    }

    /// Replaces the collection with the contents of a directory on disk.
    pub async fn open_directory(&mut self, path: &Path) -> Result<()> {
        let mirror = self.mirror()?;
        let scanned = mirror
            .list_directory(path)
            .await
            .ok_or_else(|| NoteError::mirror("scan", path))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut items = Vec::with_capacity(scanned.len() + 1);
        items.push(Item::folder(ROOT_ID, name.clone(), None, true).with_external_path(path.to_path_buf()));
        items.extend(scanned.into_iter().map(|mut item| {
            if item.parent_id.is_none() {
                item.parent_id = Some(ROOT_ID.to_string());
            }
            item
        }));
        let mut store = ItemStore::from_items(items)?;

        if store.file_count() == 0 {
            let base = format!("{}{}", UNTITLED, MARKDOWN_EXT);
            let title = store.unique_title(&base, Some(ROOT_ID), true, None);
            let file_path = mirror.join_path(path, &title);
            if !mirror.write_file(&file_path, "").await {
                return Err(NoteError::mirror("write", file_path));
            }
            let note = Item::file(path_id(&file_path), title, Some(ROOT_ID.to_string()), Some(String::new()))
                .with_external_path(file_path);
            store.insert(note)?;
        }

        self.current_item_id = store.first_file().map(|i| i.id.clone());
        self.store = store;
        self.unsynced = None;
        log::info!("opened {} with {} item(s)", path.display(), self.store.len());

        self.persistence.remember_workspace(&name, path)?;
        if let Err(e) = self.load_active().await {
            log::warn!("could not load the first note of {}: {}", path.display(), e);
        }
        self.persist()
    }

    /// Asks the mirror for a directory and opens it.
    ///
    /// Returns `Ok(false)` when the picker was cancelled.
    pub async fn pick_and_open(&mut self) -> Result<bool> {
        let Some(path) = self.mirror()?.pick_directory().await else {
            log::debug!("directory picker cancelled");
            return Ok(false);
        };
        self.open_directory(&path).await?;
        Ok(true)
    }

    /// Stores an image and returns the snippet that embeds it.
    ///
    /// The blob is saved right away but is only kept by the next autosave
    /// once some note references it.
    pub fn insert_image(&mut self, data_url: &str, alt: &str, width: Option<u32>) -> Result<InsertedImage> {
        let id = self.images.insert_data_url(data_url);
        self.persist()?;
        Ok(InsertedImage {
            markdown: markdown_reference(&id, alt, width),
            id,
        })
    }

    /// Like [`Workspace::insert_image`], for raw bytes such as a dropped file.
    pub fn insert_image_bytes(
        &mut self,
        mime: &str,
        bytes: &[u8],
        alt: &str,
        width: Option<u32>,
    ) -> Result<InsertedImage> {
        let id = self.images.insert_bytes(mime, bytes);
        self.persist()?;
        Ok(InsertedImage {
            markdown: markdown_reference(&id, alt, width),
            id,
        })
    }

    /// Markdown with every `img://` reference resolved to an inline image.
    pub fn render_preview(&self, markdown: &str) -> String {
        self.images.resolve_references(markdown)
    }

    fn persist(&self) -> Result<()> {
        self.persistence
            .save(&self.store.to_vec(), self.current_item_id.as_deref(), &self.images)
    }

    /// Explicit save from the user, with the visible "Saving… / Saved" sequence.
    pub fn save(&mut self) -> Result<()> {
        self.status = self.status.begin_manual();
        if let Err(e) = self.persist() {
            self.status = SaveStatus::Idle;
            return Err(e);
        }
        self.status = self.status.finish_manual(Utc::now());
        Ok(())
    }

    /// Drops unreferenced images, saves, and writes the active note to disk.
    ///
    /// Runs after a change is already committed, so a failed disk write does
    /// not fail the call. It is logged and kept in [`Workspace::unsynced_note`]
    /// until a later write of that note succeeds.
    pub async fn auto_save(&mut self) -> Result<()> {
        self.save_tree()?;
        self.sync_active_note().await;
        Ok(())
    }

    fn save_tree(&mut self) -> Result<()> {
        self.images.collect_garbage(self.store.iter());
        self.persist()?;
        self.status = self.status.autosaved(Utc::now());
        Ok(())
    }

    async fn sync_active_note(&mut self) {
        let Some(item) = self.current_item() else {
            return;
        };
        let (Some(path), Some(text)) = (item.external_path.clone(), item.content().map(str::to_string)) else {
            return;
        };
        let Some(mirror) = self.mirror.clone() else {
            log::warn!("no filesystem to write {} to", path.display());
            self.unsynced = Some(path);
            return;
        };

        if mirror.write_file(&path, &text).await {
            if self.unsynced.as_ref() == Some(&path) {
                self.unsynced = None;
            }
        } else {
            log::error!("Failed to write {} after saving", path.display());
            self.unsynced = Some(path);
        }
    }

    /// Path of a note whose last disk write failed, if any.
    pub fn unsynced_note(&self) -> Option<&Path> {
        self.unsynced.as_deref()
    }

    /// Writes the current state without touching the save indicator.
    pub fn flush(&self) -> Result<()> {
        self.persist()
    }

    /// Final save before the workspace goes away.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        log::info!("workspace closed");
        Ok(())
    }
}
