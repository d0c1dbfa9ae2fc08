//! Personal libraries, watch status and ratings
//!
//! Libraries are per-user documents `{ media: [MediaRecord] }` keyed by
//! name. Statuses and ratings live in one per-user profile document keyed
//! by catalog id, independent of any library. Updates are read-modify-write
//! and leave unrelated fields untouched.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{MediaCategory, MediaRecord, WatchStatus};

/// Reserved library overwritten by every smart search
pub const SMART_SEARCH_LIBRARY: &str = "חיפוש מדיה חכם";

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Library store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sign in required")]
    NotSignedIn,

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store document: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

// =============================================================================
// Documents
// =============================================================================

/// One named library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDocument {
    #[serde(default)]
    pub media: Vec<MediaRecord>,
}

/// Per-user status and rating document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(default)]
    pub statuses: BTreeMap<String, WatchStatus>,
    #[serde(default)]
    pub ratings: BTreeMap<String, u8>,
    /// Fields owned by other writers
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Document store keyed by user id and library name
pub trait LibraryStore: Send + Sync {
    fn load_library(&self, user: &str, name: &str) -> std::result::Result<LibraryDocument, StoreError>;
    fn save_library(
        &self,
        user: &str,
        name: &str,
        doc: &LibraryDocument,
    ) -> std::result::Result<(), StoreError>;
    fn library_names(&self, user: &str) -> std::result::Result<Vec<String>, StoreError>;
    fn load_user(&self, user: &str) -> std::result::Result<UserDocument, StoreError>;
    fn save_user(&self, user: &str, doc: &UserDocument) -> std::result::Result<(), StoreError>;
}

// =============================================================================
// Stores
// =============================================================================

/// In-process store, used by tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    libraries: Mutex<HashMap<(String, String), LibraryDocument>>,
    users: Mutex<HashMap<String, UserDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LibraryStore for MemoryStore {
    fn load_library(&self, user: &str, name: &str) -> std::result::Result<LibraryDocument, StoreError> {
        let libraries = self.libraries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(libraries
            .get(&(user.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn save_library(
        &self,
        user: &str,
        name: &str,
        doc: &LibraryDocument,
    ) -> std::result::Result<(), StoreError> {
        let mut libraries = self.libraries.lock().map_err(|_| StoreError::Poisoned)?;
        libraries.insert((user.to_string(), name.to_string()), doc.clone());
        Ok(())
    }

    fn library_names(&self, user: &str) -> std::result::Result<Vec<String>, StoreError> {
        let libraries = self.libraries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut names: Vec<String> = libraries
            .keys()
            .filter(|(owner, _)| owner == user)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn load_user(&self, user: &str) -> std::result::Result<UserDocument, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.get(user).cloned().unwrap_or_default())
    }

    fn save_user(&self, user: &str, doc: &UserDocument) -> std::result::Result<(), StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        users.insert(user.to_string(), doc.clone());
        Ok(())
    }
}

/// JSON files under `<root>/<user>/`
///
/// ```text
/// <root>/<user>/profile.json
/// <root>/<user>/libraries/<url-encoded name>.json
/// ```
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user: &str) -> PathBuf {
        self.root.join(urlencoding::encode(user).as_ref())
    }

    fn library_path(&self, user: &str, name: &str) -> PathBuf {
        self.user_dir(user)
            .join("libraries")
            .join(format!("{}.json", urlencoding::encode(name)))
    }

    fn read_json<T: for<'de> Deserialize<'de> + Default>(
        path: &Path,
    ) -> std::result::Result<T, StoreError> {
        if !path.exists() {
            return Ok(T::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> std::result::Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }
}

impl LibraryStore for FileStore {
    fn load_library(&self, user: &str, name: &str) -> std::result::Result<LibraryDocument, StoreError> {
        Self::read_json(&self.library_path(user, name))
    }

    fn save_library(
        &self,
        user: &str,
        name: &str,
        doc: &LibraryDocument,
    ) -> std::result::Result<(), StoreError> {
        Self::write_json(&self.library_path(user, name), doc)
    }

    fn library_names(&self, user: &str) -> std::result::Result<Vec<String>, StoreError> {
        let dir = self.user_dir(user).join("libraries");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(name) = urlencoding::decode(stem) {
                    names.push(name.into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_user(&self, user: &str) -> std::result::Result<UserDocument, StoreError> {
        Self::read_json(&self.user_dir(user).join("profile.json"))
    }

    fn save_user(&self, user: &str, doc: &UserDocument) -> std::result::Result<(), StoreError> {
        Self::write_json(&self.user_dir(user).join("profile.json"), doc)
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Current user as reported by the identity provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    user_id: Option<String>,
}

impl Identity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let user_id = Some(user_id.trim().to_string()).filter(|s| !s.is_empty());
        Self { user_id }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Current user id, or `NotSignedIn`
    pub fn require(&self) -> std::result::Result<&str, StoreError> {
        self.user_id.as_deref().ok_or(StoreError::NotSignedIn)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Sort key for Hebrew titles
///
/// Final letter forms fold to their regular forms and niqqud/cantillation
/// marks are dropped, then the text is lowercased.
pub fn hebrew_collation_key(title: &str) -> String {
    title
        .chars()
        .filter(|&c| !is_hebrew_mark(c))
        .map(|c| match c {
            'ך' => 'כ',
            'ם' => 'מ',
            'ן' => 'נ',
            'ף' => 'פ',
            'ץ' => 'צ',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Niqqud and cantillation; maqaf and the sentence marks are kept
fn is_hebrew_mark(c: char) -> bool {
    ('\u{0591}'..='\u{05C7}').contains(&c) && !matches!(c, '\u{05BE}' | '\u{05C0}' | '\u{05C3}' | '\u{05C6}')
}

fn sort_media(media: &mut [MediaRecord]) {
    media.sort_by_cached_key(|record| hebrew_collation_key(&record.title_local));
}

/// Library and status operations for the signed-in user
#[derive(Clone)]
pub struct LibraryService {
    store: Arc<dyn LibraryStore>,
    identity: Identity,
}

impl LibraryService {
    pub fn new(store: Arc<dyn LibraryStore>, identity: Identity) -> Self {
        Self { store, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn user(&self) -> Result<&str> {
        Ok(self.identity.require()?)
    }

    fn ordinary_library(name: &str) -> Result<&str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::invalid("library name is empty"));
        }
        if name == SMART_SEARCH_LIBRARY {
            return Err(PipelineError::invalid("the smart search library is managed automatically"));
        }
        Ok(name)
    }

    /// Library names owned by the user
    pub fn libraries(&self) -> Result<Vec<String>> {
        let user = self.user()?;
        Ok(self.store.library_names(user)?)
    }

    /// Records of one library in collation order
    pub fn list(&self, name: &str) -> Result<Vec<MediaRecord>> {
        let user = self.user()?;
        let mut doc = self.store.load_library(user, name.trim())?;
        sort_media(&mut doc.media);
        Ok(doc.media)
    }

    /// Add a record; `Ok(false)` when it is already present
    pub fn add(&self, name: &str, record: MediaRecord) -> Result<bool> {
        let user = self.user()?;
        let name = Self::ordinary_library(name)?;

        let mut doc = self.store.load_library(user, name)?;
        if doc.media.iter().any(|m| m.key() == record.key()) {
            debug!(library = name, id = record.external_id, "already in library");
            return Ok(false);
        }

        info!(library = name, id = record.external_id, "adding to library");
        doc.media.push(record);
        sort_media(&mut doc.media);
        self.store.save_library(user, name, &doc)?;
        Ok(true)
    }

    /// Remove a record; `Ok(false)` when it was not present
    pub fn remove(&self, name: &str, record_key: (u64, MediaCategory)) -> Result<bool> {
        let user = self.user()?;
        let name = Self::ordinary_library(name)?;

        let mut doc = self.store.load_library(user, name)?;
        let before = doc.media.len();
        doc.media.retain(|m| m.key() != record_key);
        if doc.media.len() == before {
            return Ok(false);
        }
        self.store.save_library(user, name, &doc)?;
        Ok(true)
    }

    /// Overwrite the smart search library with `records`
    pub fn replace_smart_search(&self, records: &[MediaRecord]) -> Result<()> {
        let user = self.user()?;
        let mut doc = LibraryDocument {
            media: records.to_vec(),
        };
        sort_media(&mut doc.media);
        info!(count = doc.media.len(), "replacing smart search library");
        Ok(self.store.save_library(user, SMART_SEARCH_LIBRARY, &doc)?)
    }

    /// Current status of a title (`None` when unset)
    pub fn status_of(&self, external_id: u64) -> Result<WatchStatus> {
        let user = self.user()?;
        let doc = self.store.load_user(user)?;
        Ok(doc
            .statuses
            .get(&external_id.to_string())
            .copied()
            .unwrap_or_default())
    }

    /// Advance a title's status: none → watched → to-watch → none
    pub fn toggle_status(&self, external_id: u64) -> Result<WatchStatus> {
        let user = self.user()?;
        let mut doc = self.store.load_user(user)?;
        let key = external_id.to_string();

        let next = doc.statuses.get(&key).copied().unwrap_or_default().next();
        match next {
            WatchStatus::None => {
                doc.statuses.remove(&key);
            }
            status => {
                doc.statuses.insert(key, status);
            }
        }

        self.store.save_user(user, &doc)?;
        Ok(next)
    }

    /// Rate a title from 1 to 5
    pub fn set_rating(&self, external_id: u64, rating: u8) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(PipelineError::invalid(format!(
                "rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        let user = self.user()?;
        let mut doc = self.store.load_user(user)?;
        doc.ratings.insert(external_id.to_string(), rating);
        self.store.save_user(user, &doc)?;
        Ok(())
    }

    /// Stored rating, or 0 when the title was never rated
    pub fn rating_of(&self, external_id: u64) -> Result<u8> {
        let user = self.user()?;
        let doc = self.store.load_user(user)?;
        Ok(doc
            .ratings
            .get(&external_id.to_string())
            .copied()
            .unwrap_or(0))
    }
}
