use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::models::{Item, ItemId};

/// Directory names skipped during a scan regardless of where they appear.
const IGNORED_DIRS: &[&str] = &["node_modules"];

/// Extensions (lowercase, without the dot) scanned in as image items.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// Host capability that backs items with real files and directories.
///
/// Every operation reports failure through its return value (`None` or
/// `false`) instead of an error; implementations log the cause. Callers must
/// treat anything other than a positive result as failure.
#[async_trait]
pub trait FilesystemMirror: Send + Sync {
    /// Asks the user for a directory. `None` when cancelled or unsupported.
    async fn pick_directory(&self) -> Option<PathBuf> {
        None
    }

    /// Recursively lists `path` as items, parents before their children.
    async fn list_directory(&self, path: &Path) -> Option<Vec<Item>>;

    async fn read_file(&self, path: &Path) -> Option<String>;

    async fn write_file(&self, path: &Path, text: &str) -> bool;

    /// Creates `path` and any missing parents.
    async fn make_directory(&self, path: &Path) -> bool;

    /// Removes a file, or a directory with everything inside it.
    async fn delete_entry(&self, path: &Path) -> bool;

    async fn rename_entry(&self, old_path: &Path, new_path: &Path) -> bool;

    fn join_path(&self, base: &Path, name: &str) -> PathBuf {
        base.join(name)
    }
}

/// Validates a single path component before it is joined onto a directory.
///
/// This function rejects names that:
/// - are empty, "." or ".." (current or parent directory)
/// - contain "/" or "\\" (path separators)
///
/// Dots inside a name ("v1..2.md") are fine.
pub fn validate_component(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("Name '{}' is reserved", name));
    }
    if name.contains('/') {
        return Err("Name contains invalid separator '/'".to_string());
    }
    if name.contains('\\') {
        return Err("Name contains invalid separator '\\'".to_string());
    }
    Ok(())
}

/// Identifier derived from a path, stable across rescans of the same tree.
pub fn path_id(path: &Path) -> ItemId {
    base64::engine::general_purpose::STANDARD.encode(path.to_string_lossy().as_bytes())
}

enum EntryKind {
    Markdown,
    Image,
}

fn classify(name: &str) -> Option<EntryKind> {
    let lower = name.to_lowercase();
    let ext = Path::new(&lower).extension()?.to_str()?;
    if ext == "md" {
        Some(EntryKind::Markdown)
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        Some(EntryKind::Image)
    } else {
        None
    }
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRS.contains(&name)
}

/// Mirror backed by the local disk through `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct LocalMirror;

impl LocalMirror {
    pub fn new() -> Self {
        Self
    }

    fn scan<'a>(
        &'a self,
        dir: &'a Path,
        parent_id: Option<ItemId>,
        items: &'a mut Vec<Item>,
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_skipped(&name) {
                    continue;
                }

                let path = entry.path();
                let id = path_id(&path);
                let file_type = entry.file_type().await?;
                let modified = entry
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default();

                if file_type.is_dir() {
                    let mut folder = Item::folder(id.clone(), name, parent_id.clone(), false)
                        .with_external_path(path.clone());
                    folder.last_modified = modified;
                    items.push(folder);
                    self.scan(&path, Some(id), items).await?;
                } else if file_type.is_file() {
                    let mut item = match classify(&name) {
                        Some(EntryKind::Markdown) => {
                            Item::file(id, name, parent_id.clone(), None).with_external_path(path)
                        }
                        Some(EntryKind::Image) => Item::image(id, name, parent_id.clone(), path),
                        None => continue,
                    };
                    item.last_modified = modified;
                    items.push(item);
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl FilesystemMirror for LocalMirror {
    async fn list_directory(&self, path: &Path) -> Option<Vec<Item>> {
        let mut items = Vec::new();
        match self.scan(path, None, &mut items).await {
            Ok(()) => {
                log::debug!("scanned {} entries under {}", items.len(), path.display());
                Some(items)
            }
            Err(e) => {
                log::error!("Failed to read directory {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn read_file(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path).await {
            Ok(text) => Some(text),
            Err(e) => {
                log::error!("Failed to read file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn write_file(&self, path: &Path, text: &str) -> bool {
        match fs::write(path, text).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write file {}: {}", path.display(), e);
                false
            }
        }
    }

    async fn make_directory(&self, path: &Path) -> bool {
        match fs::create_dir_all(path).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to create folder {}: {}", path.display(), e);
                false
            }
        }
    }

    async fn delete_entry(&self, path: &Path) -> bool {
        let result = match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
            Ok(_) => fs::remove_file(path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to delete {}: {}", path.display(), e);
                false
            }
        }
    }

    async fn rename_entry(&self, old_path: &Path, new_path: &Path) -> bool {
        // never clobber an entry the tree doesn't know about
        if fs::try_exists(new_path).await.unwrap_or(true) {
            log::error!(
                "Failed to rename {}: {} already exists",
                old_path.display(),
                new_path.display()
            );
            return false;
        }
        match fs::rename(old_path, new_path).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to rename {}: {}", old_path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;
    use proptest::prelude::*;
    use std::fs as stdfs;
    use tempfile::tempdir;

    #[test]
    fn test_validate_component_rejects_reserved() {
        assert!(validate_component("").is_err());
        assert!(validate_component(".").is_err());
        assert!(validate_component("..").unwrap_err().contains(".."));
    }

    #[test]
    fn test_validate_component_rejects_separators() {
        assert!(validate_component("foo/bar").unwrap_err().contains('/'));
        assert!(validate_component("foo\\bar").unwrap_err().contains('\\'));
    }

    #[test]
    fn test_validate_component_accepts_dotted_names() {
        assert!(validate_component("file.name.md").is_ok());
        assert!(validate_component("v1..2.md").is_ok());
    }

    #[test]
    fn test_path_id_is_stable() {
        let a = path_id(Path::new("/notes/a.md"));
        assert_eq!(a, path_id(Path::new("/notes/a.md")));
        assert_ne!(a, path_id(Path::new("/notes/b.md")));
        assert_eq!(a, "L25vdGVzL2EubWQ=");
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify("Readme.MD"), Some(EntryKind::Markdown)));
        assert!(matches!(classify("cat.JPEG"), Some(EntryKind::Image)));
        assert!(matches!(classify("logo.svg"), Some(EntryKind::Image)));
        assert!(classify("notes.txt").is_none());
        assert!(classify("md").is_none());
    }

    fn build_tree(root: &Path) {
        stdfs::create_dir_all(root.join("work/deep")).unwrap();
        stdfs::create_dir_all(root.join(".git")).unwrap();
        stdfs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        stdfs::write(root.join("top.md"), "# top").unwrap();
        stdfs::write(root.join("work/plan.md"), "plan").unwrap();
        stdfs::write(root.join("work/deep/pic.png"), [0u8; 4]).unwrap();
        stdfs::write(root.join("work/todo.txt"), "skip").unwrap();
        stdfs::write(root.join(".hidden.md"), "skip").unwrap();
        stdfs::write(root.join("node_modules/pkg/readme.md"), "skip").unwrap();
        stdfs::write(root.join(".git/HEAD.md"), "skip").unwrap();
    }

    #[tokio::test]
    async fn test_list_directory_filters_and_links_parents() {
        let temp_dir = tempdir().unwrap();
        build_tree(temp_dir.path());

        let items = LocalMirror::new().list_directory(temp_dir.path()).await.unwrap();

        let mut titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["deep", "pic.png", "plan.md", "top.md", "work"]);

        let work = items.iter().find(|i| i.title == "work").unwrap();
        assert_eq!(work.kind, ItemKind::Folder { is_open: false });
        assert!(work.parent_id.is_none());

        let plan = items.iter().find(|i| i.title == "plan.md").unwrap();
        assert_eq!(plan.parent_id.as_deref(), Some(work.id.as_str()));
        assert!(plan.content().is_none(), "content is loaded lazily");
        assert_eq!(plan.external_path, Some(temp_dir.path().join("work/plan.md")));

        let pic = items.iter().find(|i| i.title == "pic.png").unwrap();
        assert!(pic.is_image());
    }

    #[tokio::test]
    async fn test_list_directory_is_depth_first() {
        let temp_dir = tempdir().unwrap();
        build_tree(temp_dir.path());

        let items = LocalMirror::new().list_directory(temp_dir.path()).await.unwrap();

        // every item appears after its parent, and a folder's subtree is contiguous
        for (pos, item) in items.iter().enumerate() {
            if let Some(parent) = &item.parent_id {
                let parent_pos = items.iter().position(|i| &i.id == parent).unwrap();
                assert!(parent_pos < pos);
                assert!(items[parent_pos + 1..pos]
                    .iter()
                    .all(|between| between.parent_id.is_some()));
            }
        }
        let work = items.iter().position(|i| i.title == "work").unwrap();
        let deep = items.iter().position(|i| i.title == "deep").unwrap();
        let pic = items.iter().position(|i| i.title == "pic.png").unwrap();
        assert!(work < deep && deep < pic);
    }

    #[tokio::test]
    async fn test_list_directory_ids_stable_across_rescans() {
        let temp_dir = tempdir().unwrap();
        build_tree(temp_dir.path());
        let mirror = LocalMirror::new();

        let mut first: Vec<ItemId> = mirror.list_directory(temp_dir.path()).await.unwrap().into_iter().map(|i| i.id).collect();
        let mut second: Vec<ItemId> = mirror.list_directory(temp_dir.path()).await.unwrap().into_iter().map(|i| i.id).collect();
        first.sort();
        second.sort();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_missing_directory_returns_none() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(LocalMirror::new().list_directory(&missing).await.is_none());
    }

    #[tokio::test]
    async fn test_file_operations() {
        let temp_dir = tempdir().unwrap();
        let mirror = LocalMirror::new();
        let dir = mirror.join_path(temp_dir.path(), "notes");
        let file = mirror.join_path(&dir, "a.md");

        assert!(mirror.make_directory(&dir).await);
        assert!(mirror.write_file(&file, "hello").await);
        assert_eq!(mirror.read_file(&file).await.as_deref(), Some("hello"));

        let renamed = dir.join("b.md");
        assert!(mirror.rename_entry(&file, &renamed).await);
        assert!(mirror.read_file(&file).await.is_none());
        assert!(mirror.read_file(&renamed).await.is_some());

        assert!(mirror.delete_entry(&dir).await);
        assert!(!dir.exists());
        assert!(!mirror.delete_entry(&dir).await);
    }

    #[tokio::test]
    async fn test_rename_refuses_to_overwrite() {
        let temp_dir = tempdir().unwrap();
        let mirror = LocalMirror::new();
        let a = temp_dir.path().join("a.md");
        let b = temp_dir.path().join("b.md");
        stdfs::write(&a, "a").unwrap();
        stdfs::write(&b, "b").unwrap();

        assert!(!mirror.rename_entry(&a, &b).await);
        assert_eq!(stdfs::read_to_string(&b).unwrap(), "b");
    }

    #[tokio::test]
    async fn test_default_picker_is_unsupported() {
        assert!(LocalMirror::new().pick_directory().await.is_none());
    }

    // Strategy for names containing a path separator
    fn name_with_separator() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9_-]{0,10}".prop_map(|s| format!("{}/{}", s, s)),
            "[a-zA-Z0-9_-]{0,10}".prop_map(|s| format!("{}\\{}", s, s)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any name carrying a separator is rejected before it can reach the disk.
        #[test]
        fn prop_separator_names_rejected(name in name_with_separator()) {
            prop_assert!(validate_component(&name).is_err(), "Name '{}' should be rejected", name);
        }

        /// Plain names are accepted.
        #[test]
        fn prop_plain_names_accepted(name in "[a-zA-Z0-9_ -]{1,20}(\\.md)?") {
            prop_assume!(name != "." && name != "..");
            prop_assert!(validate_component(&name).is_ok());
        }
    }
}
