//! Embedded image blobs and `img://` references inside note content.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use base64::Engine;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::models::Item;

/// Scheme used by notes to point at a blob in the image store.
pub const IMAGE_SCHEME: &str = "img://";

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"img://([a-zA-Z0-9_-]+)").expect("valid reference pattern"));

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(img://([^)\s]+)(?:\s*=(\d+)x)?\)").expect("valid image pattern")
});

/// Base64 data URLs keyed by generated id.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct ImageStore(BTreeMap<String, String>);

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Stores an already encoded data URL and returns its new id.
    pub fn insert_data_url(&mut self, data_url: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.0.insert(id.clone(), data_url.into());
        id
    }

    /// Encodes raw image bytes as a data URL and stores it.
    pub fn insert_bytes(&mut self, mime: &str, bytes: &[u8]) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.insert_data_url(format!("data:{};base64,{}", mime, encoded))
    }

    /// Drops every blob that no file references. Returns how many were removed.
    pub fn collect_garbage<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) -> usize {
        let used: HashSet<&str> = items
            .into_iter()
            .filter_map(Item::content)
            .flat_map(referenced_ids)
            .collect();

        let before = self.0.len();
        self.0.retain(|id, _| used.contains(id.as_str()));
        let removed = before - self.0.len();
        if removed > 0 {
            log::debug!("dropped {} orphaned image(s)", removed);
        }
        removed
    }

    /// Replaces `![alt](img://id)` references with inline `<img>` tags.
    ///
    /// Unknown ids become a visible "image not found" placeholder so the
    /// rest of the note still renders.
    pub fn resolve_references(&self, markdown: &str) -> String {
        MARKDOWN_IMAGE
            .replace_all(markdown, |caps: &Captures| {
                let alt = &caps[1];
                match self.get(&caps[2]) {
                    Some(src) => {
                        let width = caps
                            .get(3)
                            .map(|w| format!(" width=\"{}\"", w.as_str()))
                            .unwrap_or_default();
                        format!(
                            "<img src=\"{}\" alt=\"{}\"{} style=\"max-width:100%\">",
                            src,
                            escape_attr(alt),
                            width
                        )
                    }
                    None => format!("![{} (image not found)]()", alt),
                }
            })
            .into_owned()
    }
}

/// Ids referenced through `img://` anywhere in `content`.
pub fn referenced_ids(content: &str) -> impl Iterator<Item = &str> {
    REFERENCE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Markdown snippet that embeds image `id`, with an optional display width.
pub fn markdown_reference(id: &str, alt: &str, width: Option<u32>) -> String {
    let alt = match alt.trim() {
        "" => "image",
        alt => alt,
    };
    let size = width.map(|w| format!(" ={}x", w)).unwrap_or_default();
    format!("![{}]({}{}{})", alt, IMAGE_SCHEME, id, size)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
