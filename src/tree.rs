//! In-memory item tree.
//!
//! Items are kept in an adjacency list: records by id, plus a children index
//! keyed by parent id. Insertion order is preserved for persistence and for
//! "first remaining file" lookups.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{NoteError, Result};
use crate::models::{Item, ItemId, ItemKind, MARKDOWN_EXT};

#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: HashMap<ItemId, Item>,
    order: Vec<ItemId>,
    children: HashMap<Option<ItemId>, Vec<ItemId>>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from persisted or scanned records.
    ///
    /// Duplicate ids are an error. Items whose parent is missing or is not a
    /// folder are re-attached to the root rather than dropped.
    pub fn from_items(items: Vec<Item>) -> Result<Self> {
        let folders: HashSet<ItemId> = items
            .iter()
            .filter(|i| i.is_folder())
            .map(|i| i.id.clone())
            .collect();

        let mut store = Self::new();
        for mut item in items {
            if let Some(parent) = &item.parent_id {
                if !folders.contains(parent) || parent == &item.id {
                    log::warn!(
                        "item {} references missing folder {}, moving it to the root",
                        item.id,
                        parent
                    );
                    item.parent_id = None;
                }
            }
            if store.items.contains_key(&item.id) {
                return Err(NoteError::Storage(format!("duplicate item id {}", item.id)));
            }
            store.index(item);
        }

        // A parent chain that loops never reaches the root; cut it there.
        let ids: Vec<ItemId> = store.order.clone();
        for id in ids {
            if store.has_cycle(&id) {
                log::warn!("item {} is part of a parent cycle, moving it to the root", id);
                store.reparent(&id, None);
            }
        }
        Ok(store)
    }

    fn has_cycle(&self, id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            if !seen.insert(current.clone()) {
                return true;
            }
            cursor = self.items.get(&current).and_then(|i| i.parent_id.clone());
        }
        false
    }

    fn index(&mut self, item: Item) {
        self.children
            .entry(item.parent_id.clone())
            .or_default()
            .push(item.id.clone());
        self.order.push(item.id.clone());
        self.items.insert(item.id.clone(), item);
    }

    /// Appends an item. The parent, if any, must be an existing folder.
    pub fn insert(&mut self, item: Item) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(NoteError::refused(format!("an item with id {} already exists", item.id)));
        }
        if let Some(parent) = &item.parent_id {
            self.folder(parent)?;
        }
        self.index(item);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Mutable access for content and metadata edits.
    ///
    /// Parent changes must go through [`ItemStore::reparent`] so the children
    /// index stays in sync.
    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Resolves `id` to an item, or reports it missing.
    pub fn require(&self, id: &str) -> Result<&Item> {
        self.items
            .get(id)
            .ok_or_else(|| NoteError::NotFound(id.to_string()))
    }

    /// Resolves `id` to a folder item.
    pub fn folder(&self, id: &str) -> Result<&Item> {
        let item = self.require(id)?;
        if item.is_folder() {
            Ok(item)
        } else {
            Err(NoteError::NotAFolder(id.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Direct children of `parent` (`None` for the root) in insertion order.
    pub fn children(&self, parent: Option<&str>) -> &[ItemId] {
        self.children
            .get(&parent.map(str::to_string))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn files(&self) -> impl Iterator<Item = &Item> {
        self.iter().filter(|i| i.is_file())
    }

    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    pub fn first_file(&self) -> Option<&Item> {
        self.files().next()
    }

    pub fn to_vec(&self) -> Vec<Item> {
        self.iter().cloned().collect()
    }

    /// Returns `base` if it is free among the children of `parent_id`,
    /// otherwise `Name 1.md`, `Name 2.md`, ... until one is free.
    ///
    /// `exclude_id` is ignored during the comparison so an item can keep its
    /// own title.
    pub fn unique_title(
        &self,
        base: &str,
        parent_id: Option<&str>,
        is_file: bool,
        exclude_id: Option<&str>,
    ) -> String {
        let taken = |title: &str| {
            self.children(parent_id).iter().any(|id| {
                Some(id.as_str()) != exclude_id
                    && self.items.get(id).is_some_and(|i| i.title == title)
            })
        };

        let extension = if is_file { MARKDOWN_EXT } else { "" };
        let name_only = if is_file && has_markdown_ext(base) {
            &base[..base.len() - MARKDOWN_EXT.len()]
        } else {
            base
        };

        let mut title = base.to_string();
        let mut counter = 1;
        while taken(&title) {
            title = format!("{} {}{}", name_only, counter, extension);
            counter += 1;
        }
        title
    }

    /// The item and every item below it, collected depth-first.
    pub fn collect_descendants(&self, id: &str) -> HashSet<ItemId> {
        let mut found = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !found.insert(current.clone()) {
                continue;
            }
            stack.extend(self.children(Some(&current)).iter().cloned());
        }
        found
    }

    /// True when `candidate` is `ancestor` or lies somewhere below it.
    pub fn is_descendant_of(&self, candidate: Option<&str>, ancestor: &str) -> bool {
        let mut cursor = candidate.map(str::to_string);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            // parent chains are acyclic once loaded; the bound only guards corrupt input
            steps += 1;
            if steps > self.items.len() {
                return false;
            }
            cursor = self.items.get(&current).and_then(|i| i.parent_id.clone());
        }
        false
    }

    /// Moves `id` under `parent`, keeping the children index consistent.
    pub(crate) fn reparent(&mut self, id: &str, parent: Option<ItemId>) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut item.parent_id, parent.clone());
        if let Some(siblings) = self.children.get_mut(&old) {
            siblings.retain(|c| c != id);
        }
        self.children.entry(parent).or_default().push(id.to_string());
    }

    /// Removes every id in `ids` and returns the removed records.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<ItemId>) -> Vec<Item> {
        let removed: Vec<Item> = self
            .order
            .iter()
            .filter(|id| ids.contains(*id))
            .filter_map(|id| self.items.get(id).cloned())
            .collect();

        self.order.retain(|id| !ids.contains(id));
        for item in &removed {
            self.items.remove(&item.id);
            if let Some(siblings) = self.children.get_mut(&item.parent_id) {
                siblings.retain(|c| c != &item.id);
            }
            self.children.remove(&Some(item.id.clone()));
        }
        removed
    }

    /// Rewrites the mirrored paths of everything below `id` after the
    /// directory at `old_root` moved to `new_root`.
    pub(crate) fn rebase_external_paths(&mut self, id: &str, old_root: &Path, new_root: &Path) {
        for descendant in self.collect_descendants(id) {
            if descendant == id {
                continue;
            }
            let Some(item) = self.items.get_mut(&descendant) else {
                continue;
            };
            if let Some(path) = &item.external_path {
                if let Ok(rest) = path.strip_prefix(old_root) {
                    item.external_path = Some(new_root.join(rest));
                }
            }
        }
    }

    /// Flips or sets a folder's expansion state.
    pub(crate) fn set_open(&mut self, id: &str, open: Option<bool>) {
        if let Some(Item {
            kind: ItemKind::Folder { is_open },
            ..
        }) = self.items.get_mut(id)
        {
            *is_open = open.unwrap_or(!*is_open);
        }
    }
}

/// Case-insensitive check for the markdown suffix.
pub fn has_markdown_ext(title: &str) -> bool {
    title.len() >= MARKDOWN_EXT.len()
        && title.is_char_boundary(title.len() - MARKDOWN_EXT.len())
        && title[title.len() - MARKDOWN_EXT.len()..].eq_ignore_ascii_case(MARKDOWN_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ROOT_ID;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn file(id: &str, title: &str, parent: Option<&str>) -> Item {
        Item::file(id, title, parent.map(str::to_string), Some(String::new()))
    }

    fn folder(id: &str, title: &str, parent: Option<&str>) -> Item {
        Item::folder(id, title, parent.map(str::to_string), false)
    }

    fn sample() -> ItemStore {
        ItemStore::from_items(vec![
            folder("a", "A", None),
            folder("b", "B", Some("a")),
            file("n1", "One.md", Some("b")),
            file("n2", "Two.md", Some("a")),
            file("n3", "Three.md", None),
        ])
        .unwrap()
    }

    #[test]
    fn test_unique_title_returns_base_when_free() {
        let store = sample();
        assert_eq!(store.unique_title("Fresh.md", None, true, None), "Fresh.md");
    }

    #[test]
    fn test_unique_title_appends_counter_before_extension() {
        let mut store = sample();
        assert_eq!(store.unique_title("Three.md", None, true, None), "Three 1.md");

        store.insert(file("n4", "Three 1.md", None)).unwrap();
        assert_eq!(store.unique_title("Three.md", None, true, None), "Three 2.md");
    }

    #[test]
    fn test_unique_title_for_folders_has_no_extension() {
        let store = sample();
        assert_eq!(store.unique_title("A", None, false, None), "A 1");
    }

    #[test]
    fn test_unique_title_ignores_excluded_item() {
        let store = sample();
        assert_eq!(store.unique_title("Three.md", None, true, Some("n3")), "Three.md");
    }

    #[test]
    fn test_unique_title_only_looks_at_siblings() {
        let store = sample();
        assert_eq!(store.unique_title("One.md", Some("a"), true, None), "One.md");
    }

    #[test]
    fn test_collect_descendants() {
        let store = sample();
        let ids = store.collect_descendants("a");
        let expected: HashSet<ItemId> = ["a", "b", "n1", "n2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_is_descendant_of() {
        let store = sample();
        assert!(store.is_descendant_of(Some("b"), "a"));
        assert!(store.is_descendant_of(Some("a"), "a"));
        assert!(!store.is_descendant_of(Some("a"), "b"));
        assert!(!store.is_descendant_of(None, "a"));
    }

    #[test]
    fn test_insert_rejects_missing_or_file_parent() {
        let mut store = sample();
        assert!(matches!(
            store.insert(file("x", "x.md", Some("nope"))),
            Err(NoteError::NotFound(_))
        ));
        assert!(matches!(
            store.insert(file("x", "x.md", Some("n1"))),
            Err(NoteError::NotAFolder(_))
        ));
        assert!(store.insert(file("n1", "dup.md", None)).is_err());
    }

    #[test]
    fn test_from_items_reattaches_orphans() {
        let store = ItemStore::from_items(vec![file("n1", "a.md", Some("gone"))]).unwrap();
        assert_eq!(store.get("n1").unwrap().parent_id, None);
        assert_eq!(store.children(None), &["n1".to_string()]);
    }

    #[test]
    fn test_from_items_breaks_parent_cycles() {
        let store = ItemStore::from_items(vec![
            folder("a", "A", Some("b")),
            folder("b", "B", Some("a")),
        ])
        .unwrap();
        assert!(store.iter().any(|i| i.parent_id.is_none()));
        assert!(!store.is_descendant_of(Some("a"), "b") || !store.is_descendant_of(Some("b"), "a"));
    }

    #[test]
    fn test_from_items_rejects_duplicate_ids() {
        let result = ItemStore::from_items(vec![file("n1", "a.md", None), file("n1", "b.md", None)]);
        assert!(matches!(result, Err(NoteError::Storage(_))));
    }

    #[test]
    fn test_reparent_updates_children_index() {
        let mut store = sample();
        store.reparent("b", None);
        assert!(!store.children(Some("a")).contains(&"b".to_string()));
        assert!(store.children(None).contains(&"b".to_string()));
        assert_eq!(store.get("b").unwrap().parent_id, None);
    }

    #[test]
    fn test_remove_all_keeps_order_of_survivors() {
        let mut store = sample();
        let removed = store.remove_all(&store.collect_descendants("a"));
        assert_eq!(removed.len(), 4);
        let left: Vec<&str> = store.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(left, vec!["n3"]);
        assert!(store.children(Some("a")).is_empty());
    }

    #[test]
    fn test_rebase_external_paths() {
        let mut store = ItemStore::from_items(vec![
            folder(ROOT_ID, "notes", None).with_external_path(PathBuf::from("/n")),
            folder("d", "d", Some(ROOT_ID)).with_external_path(PathBuf::from("/n/d")),
            file("f", "f.md", Some("d")).with_external_path(PathBuf::from("/n/d/f.md")),
        ])
        .unwrap();
        store.rebase_external_paths("d", Path::new("/n/d"), Path::new("/n/e"));
        assert_eq!(store.get("f").unwrap().external_path, Some(PathBuf::from("/n/e/f.md")));
        // the moved item itself is updated by the caller
        assert_eq!(store.get("d").unwrap().external_path, Some(PathBuf::from("/n/d")));
    }

    #[test]
    fn test_set_open_toggles() {
        let mut store = sample();
        store.set_open("a", None);
        assert_eq!(store.get("a").unwrap().kind, ItemKind::Folder { is_open: true });
        store.set_open("a", Some(true));
        assert_eq!(store.get("a").unwrap().kind, ItemKind::Folder { is_open: true });
        store.set_open("a", None);
        assert_eq!(store.get("a").unwrap().kind, ItemKind::Folder { is_open: false });
    }

    #[test]
    fn test_has_markdown_ext() {
        assert!(has_markdown_ext("a.md"));
        assert!(has_markdown_ext("A.MD"));
        assert!(!has_markdown_ext("a.txt"));
        assert!(!has_markdown_ext("md"));
    }

    // Strategy for sibling title sets drawn from a small alphabet so collisions are common
    fn sibling_titles() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec(
            prop_oneof![
                Just("Untitled.md".to_string()),
                Just("Untitled 1.md".to_string()),
                Just("Untitled 2.md".to_string()),
                "[a-c]{1,2}( [1-3])?\\.md",
            ],
            0..12,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The resolved title never collides with a sibling and is stable across calls.
        #[test]
        fn prop_unique_title_never_collides(titles in sibling_titles(), base in "[a-c]{1,2}\\.md|Untitled\\.md") {
            let items: Vec<Item> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| file(&format!("id{}", i), t, None))
                .collect();
            let store = ItemStore::from_items(items).unwrap();

            let title = store.unique_title(&base, None, true, None);
            prop_assert!(store.iter().all(|i| i.title != title));
            prop_assert_eq!(title.clone(), store.unique_title(&base, None, true, None));
            prop_assert!(has_markdown_ext(&title));
        }

        /// Descendant collection returns exactly the subtree and nothing else.
        #[test]
        fn prop_descendants_are_closed_under_parent(parents in proptest::collection::vec(0usize..8, 1..16)) {
            // item i's parent is a folder with a smaller index, so the input is always a forest
            let mut items = vec![folder("f0", "f0", None)];
            for (i, p) in parents.iter().enumerate() {
                let idx = i + 1;
                let parent = format!("f{}", p % idx);
                items.push(folder(&format!("f{}", idx), &format!("f{}", idx), Some(&parent)));
            }
            let store = ItemStore::from_items(items).unwrap();

            let set = store.collect_descendants("f1");
            for item in store.iter() {
                let inside = store.is_descendant_of(Some(&item.id), "f1");
                prop_assert_eq!(inside, set.contains(&item.id));
            }
        }
    }
}
