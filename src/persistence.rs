//! Key-value persistence for the item tree, the active item and the image store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

use crate::error::{NoteError, Result};
use crate::images::ImageStore;
use crate::models::{Item, ItemId, RecentWorkspace};

pub const ITEMS_KEY: &str = "app-items";
pub const CURRENT_ITEM_KEY: &str = "app-current-item";
pub const IMAGES_KEY: &str = "app-images";
pub const RECENT_KEY: &str = "app-recent-workspaces";
/// Single-slot format used before folders existed.
pub const LEGACY_NOTES_KEY: &str = "app-notes";

/// How many recently opened directories are remembered.
pub const MAX_RECENT_WORKSPACES: usize = 5;

/// How long the "Saved" confirmation stays up after a manual save.
pub const SAVED_FLASH: Duration = Duration::from_secs(2);

const WELCOME_CONTENT: &str = "# Welcome to Emerald! 💎

*(Português abaixo | Español abajo)*

Emerald is a minimalist, self-hosted Markdown editor designed for speed and simplicity.

- **No accounts, no cloud:** Everything is stored locally on your machine.
- **Fast and Distraction-free:** The editor instantly renders your markdown with a live preview.
- **Customizable:** Click the `⋮` menu to change themes, fonts, and accent colors.
- **Image Support:** Paste (`Ctrl+V`) or drag & drop images straight into the editor. Try it!

To get started, explore the sidebar, or click the **New Note** icon to create your own!

---

# Bem-vindo(a) ao Emerald! 💎

O Emerald é um editor Markdown minimalista e self-hosted, focado em velocidade e simplicidade.

- **Sem contas, sem nuvem:** Tudo fica salvo localmente na sua máquina.
- **Rápido e sem distrações:** O editor renderiza seu Markdown instantaneamente com pré-visualização em tempo real.
- **Personalizável:** Clique no menu `⋮` para mudar temas, fontes e cores de destaque.
- **Suporte a Imagens:** Cole (`Ctrl+V`) ou arraste e solte imagens direto no editor. Experimente!

Para começar, explore a barra lateral, ou clique no ícone **Nova Nota** para criar a sua!

---

# ¡Te damos la bienvenida a Emerald! 💎

Emerald es un editor Markdown minimalista y autoalojado, diseñado para ser rápido y sencillo.

- **Sin cuentas ni la nube:** Todo se guarda localmente en tu equipo.
- **Rápido y sin distracciones:** El editor muestra tu Markdown al instante con vista previa en vivo.
- **Personalizable:** Haz clic en el menú `⋮` para cambiar temas, colores y tipos de letra.
- **Soporte para Imágenes:** Pega (`Ctrl+V`) o arrastra y suelta imágenes directamente en el editor. ¡Pruébalo!

Para empezar, explora la barra lateral o haz clic en el icono de **Nueva Nota** para crear tu primera nota.
";

/// A string-keyed slot store, the desktop analogue of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, mostly for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}

/// Stores each slot as `{dir}/{key}.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Opens (and creates) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store under the platform data directory.
    ///
    /// On Linux: ~/.local/share/emerald/
    /// On macOS: ~/Library/Application Support/emerald/
    /// On Windows: C:\Users\{user}\AppData\Roaming\emerald\
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| NoteError::Storage("Could not determine data directory".to_string()))?
            .join("emerald");
        Self::new(dir)
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(|c| c == '/' || c == '\\') || key.contains("..") {
            return Err(NoteError::Storage(format!("invalid slot key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonDirStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Everything `save()` writes and `load()` restores.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub items: Vec<Item>,
    pub current_item_id: Option<ItemId>,
    pub images: ImageStore,
}

impl Snapshot {
    /// The first-run collection: one open folder and a welcome note.
    pub fn seed() -> Self {
        let items = vec![
            Item::folder("folder-default", "Notes", None, true),
            Item::file(
                "note-default",
                "Welcome.md",
                None,
                Some(WELCOME_CONTENT.to_string()),
            ),
        ];
        Self {
            items,
            current_item_id: Some("note-default".to_string()),
            images: ImageStore::new(),
        }
    }
}

/// A note record in the pre-folder storage format.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNote {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    last_modified: DateTime<Utc>,
}

impl From<LegacyNote> for Item {
    fn from(note: LegacyNote) -> Self {
        let mut item = Item::file(note.id, note.title, None, Some(note.content));
        item.last_modified = note.last_modified;
        item
    }
}

/// Reads and writes workspace snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Overwrites the three workspace slots.
    pub fn save(&self, items: &[Item], current_item_id: Option<&str>, images: &ImageStore) -> Result<()> {
        self.store.set(ITEMS_KEY, &serde_json::to_string(items)?)?;
        match current_item_id {
            Some(id) => self.store.set(CURRENT_ITEM_KEY, id)?,
            None => self.store.remove(CURRENT_ITEM_KEY)?,
        }
        self.store.set(IMAGES_KEY, &serde_json::to_string(images)?)?;
        log::debug!("saved {} item(s), {} image(s)", items.len(), images.len());
        Ok(())
    }

    /// Restores the last saved snapshot.
    ///
    /// Falls back to migrating the legacy notes slot, then to the seed
    /// collection. The active id is validated against the loaded items.
    pub fn load(&self) -> Result<Snapshot> {
        let items = match self.store.get(ITEMS_KEY)? {
            Some(raw) => serde_json::from_str::<Vec<Item>>(&raw)?,
            None => match self.store.get(LEGACY_NOTES_KEY)? {
                Some(raw) => {
                    let legacy: Vec<LegacyNote> = serde_json::from_str(&raw)?;
                    log::info!("migrating {} note(s) from the legacy format", legacy.len());
                    legacy.into_iter().map(Item::from).collect()
                }
                None => {
                    log::info!("no saved notes found, seeding the default collection");
                    return Ok(Snapshot::seed());
                }
            },
        };

        let images = match self.store.get(IMAGES_KEY)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => ImageStore::new(),
        };

        let saved_current = self.store.get(CURRENT_ITEM_KEY)?;
        let current_item_id = saved_current
            .filter(|id| items.iter().any(|i| &i.id == id))
            .or_else(|| items.iter().find(|i| i.is_file()).map(|i| i.id.clone()));

        Ok(Snapshot {
            items,
            current_item_id,
            images,
        })
    }

    pub fn recent_workspaces(&self) -> Result<Vec<RecentWorkspace>> {
        match self.store.get(RECENT_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Moves `path` to the front of the recent list, dropping older duplicates.
    pub fn remember_workspace(&self, name: &str, path: &Path) -> Result<Vec<RecentWorkspace>> {
        let mut recent = self.recent_workspaces()?;
        recent.retain(|w| w.path != path);
        recent.insert(
            0,
            RecentWorkspace {
                name: name.to_string(),
                path: path.to_path_buf(),
            },
        );
        recent.truncate(MAX_RECENT_WORKSPACES);
        self.store.set(RECENT_KEY, &serde_json::to_string(&recent)?)?;
        Ok(recent)
    }
}

/// What the save indicator currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    JustSaved(DateTime<Utc>),
    SavedAt(DateTime<Utc>),
}

impl SaveStatus {
    /// Autosaves skip the visible "saving" phase.
    pub fn autosaved(self, now: DateTime<Utc>) -> Self {
        match self {
            // a manual save in progress keeps its own sequence
            SaveStatus::Saving => self,
            _ => SaveStatus::SavedAt(now),
        }
    }

    pub fn begin_manual(self) -> Self {
        SaveStatus::Saving
    }

    pub fn finish_manual(self, now: DateTime<Utc>) -> Self {
        SaveStatus::JustSaved(now)
    }

    /// Expires the "Saved" flash once [`SAVED_FLASH`] has passed.
    pub fn tick(self, now: DateTime<Utc>) -> Self {
        match self {
            SaveStatus::JustSaved(at) if now.signed_duration_since(at).to_std().unwrap_or_default() >= SAVED_FLASH => {
                SaveStatus::SavedAt(at)
            }
            other => other,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SaveStatus::Idle => String::new(),
            SaveStatus::Saving => "Saving…".to_string(),
            SaveStatus::JustSaved(_) => "Saved".to_string(),
            SaveStatus::SavedAt(at) => format!("Saved at {}", at.with_timezone(&Local).format("%H:%M")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_items() -> Vec<Item> {
        vec![
            Item::folder("f1", "Work", None, false),
            Item::file("n1", "Plan.md", Some("f1".into()), Some("![x](img://a)".into())),
            Item::file("n2", "Todo.md", None, Some(String::new())),
        ]
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_json_dir_store_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = JsonDirStore::new(temp_dir.path().join("data")).unwrap();

        store.set(ITEMS_KEY, "[]").unwrap();
        assert!(temp_dir.path().join("data").join("app-items.json").exists());
        assert_eq!(store.get(ITEMS_KEY).unwrap(), Some("[]".to_string()));

        store.remove(ITEMS_KEY).unwrap();
        store.remove(ITEMS_KEY).unwrap();
        assert_eq!(store.get(ITEMS_KEY).unwrap(), None);
    }

    #[test]
    fn test_json_dir_store_rejects_path_keys() {
        let temp_dir = tempdir().unwrap();
        let store = JsonDirStore::new(temp_dir.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
        assert!(store.set("a/b", "x").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let persistence = Persistence::in_memory();
        let mut images = ImageStore::new();
        let image_id = images.insert_data_url("data:image/png;base64,AAAA");

        persistence.save(&sample_items(), Some("n1"), &images).unwrap();
        let snapshot = persistence.load().unwrap();

        assert_eq!(snapshot.items.len(), 3);
        for (loaded, original) in snapshot.items.iter().zip(sample_items()) {
            assert_eq!(loaded.id, original.id);
            assert_eq!(loaded.parent_id, original.parent_id);
            assert_eq!(loaded.title, original.title);
            assert_eq!(loaded.kind, original.kind);
            assert_eq!(loaded.external_path, original.external_path);
        }
        assert_eq!(snapshot.current_item_id.as_deref(), Some("n1"));
        assert!(snapshot.images.contains(&image_id));
    }

    #[test]
    fn test_save_without_current_clears_slot() {
        let persistence = Persistence::in_memory();
        persistence.save(&sample_items(), Some("n2"), &ImageStore::new()).unwrap();
        persistence.save(&sample_items(), None, &ImageStore::new()).unwrap();

        assert_eq!(persistence.store().get(CURRENT_ITEM_KEY).unwrap(), None);
        // falls back to the first file on load
        assert_eq!(persistence.load().unwrap().current_item_id.as_deref(), Some("n1"));
    }

    #[test]
    fn test_load_seeds_defaults_when_empty() {
        let snapshot = Persistence::in_memory().load().unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items[0].is_folder());
        assert_eq!(snapshot.items[1].title, "Welcome.md");
        assert!(snapshot.items[1].content().unwrap().contains("Bem-vindo"));
        assert_eq!(snapshot.current_item_id.as_deref(), Some("note-default"));
    }

    #[test]
    fn test_load_migrates_legacy_notes() {
        let persistence = Persistence::in_memory();
        persistence
            .store()
            .set(
                LEGACY_NOTES_KEY,
                r#"[{"id":"old1","title":"Groceries","content":"milk","lastModified":1600000000000},{"id":"old2"}]"#,
            )
            .unwrap();

        let snapshot = persistence.load().unwrap();

        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items.iter().all(|i| i.is_file() && i.parent_id.is_none()));
        assert_eq!(snapshot.items[0].content(), Some("milk"));
        assert_eq!(snapshot.items[0].last_modified.timestamp_millis(), 1_600_000_000_000);
        assert_eq!(snapshot.current_item_id.as_deref(), Some("old1"));
    }

    #[test]
    fn test_load_prefers_items_over_legacy() {
        let persistence = Persistence::in_memory();
        persistence.save(&sample_items(), None, &ImageStore::new()).unwrap();
        persistence.store().set(LEGACY_NOTES_KEY, r#"[{"id":"old"}]"#).unwrap();

        let snapshot = persistence.load().unwrap();
        assert!(snapshot.items.iter().all(|i| i.id != "old"));
    }

    #[test]
    fn test_load_ignores_stale_current_id() {
        let persistence = Persistence::in_memory();
        persistence.save(&sample_items(), Some("deleted"), &ImageStore::new()).unwrap();
        assert_eq!(persistence.load().unwrap().current_item_id.as_deref(), Some("n1"));
    }

    #[test]
    fn test_load_reports_corrupt_items() {
        let persistence = Persistence::in_memory();
        persistence.store().set(ITEMS_KEY, "{not json").unwrap();
        assert!(matches!(persistence.load(), Err(NoteError::Json(_))));
    }

    #[test]
    fn test_remember_workspace_is_mru_deduplicated_and_capped() {
        let persistence = Persistence::in_memory();
        for i in 0..7 {
            persistence
                .remember_workspace(&format!("w{}", i), Path::new(&format!("/w{}", i)))
                .unwrap();
        }
        let recent = persistence.remember_workspace("again", Path::new("/w3")).unwrap();

        assert_eq!(recent.len(), MAX_RECENT_WORKSPACES);
        assert_eq!(recent[0].path, PathBuf::from("/w3"));
        assert_eq!(recent[0].name, "again");
        assert_eq!(recent.iter().filter(|w| w.path == Path::new("/w3")).count(), 1);
        assert_eq!(recent[1].path, PathBuf::from("/w6"));
        assert_eq!(persistence.recent_workspaces().unwrap(), recent);
    }

    #[test]
    fn test_save_status_manual_sequence() {
        let t0 = Utc::now();
        let status = SaveStatus::Idle.begin_manual();
        assert_eq!(status.label(), "Saving…");

        let status = status.finish_manual(t0);
        assert_eq!(status, SaveStatus::JustSaved(t0));
        assert_eq!(status.label(), "Saved");

        assert_eq!(status.tick(t0 + chrono::Duration::milliseconds(500)), SaveStatus::JustSaved(t0));
        let status = status.tick(t0 + chrono::Duration::seconds(2));
        assert_eq!(status, SaveStatus::SavedAt(t0));
        assert!(status.label().starts_with("Saved at "));
    }

    #[test]
    fn test_autosave_skips_saving_phase() {
        let t0 = Utc::now();
        assert_eq!(SaveStatus::Idle.autosaved(t0), SaveStatus::SavedAt(t0));
        assert_eq!(SaveStatus::Saving.autosaved(t0), SaveStatus::Saving);

        // an autosave during the "Saved" flash shows its own time
        let later = t0 + chrono::Duration::minutes(3);
        assert_eq!(SaveStatus::JustSaved(t0).autosaved(later), SaveStatus::SavedAt(later));
    }
}
