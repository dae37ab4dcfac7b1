//! Local preference store: teacher training text and recent student names.
//!
//! DESIGN
//! ======
//! Components receive a [`Preferences`] handle instead of reaching for
//! ambient storage. The handle wraps any [`PreferenceStore`] (a string
//! key-value capability) and exposes typed accessors. Reads happen when a
//! screen or turn needs the value; writes only on explicit save or login.
//! Last writer wins.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

pub const KEY_TRAINING_TEXT: &str = "thay_dung_training_data";
pub const KEY_RECENT_NAMES: &str = "thay_dung_student_names";
pub const MAX_RECENT_NAMES: usize = 5;

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("preference file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key-value capability backing [`Preferences`].
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error when the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON object file, loaded once and rewritten on every `set`.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FilePreferences {
    /// Open `<dir>/preferences.json`, creating `dir` if needed. A missing or
    /// unreadable file starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> Result<Self, PreferenceError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(PREFERENCES_FILE);
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "preferences: unreadable file, starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values: Mutex::new(values) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, values: &HashMap<String, String>) -> Result<(), PreferenceError> {
        let encoded = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        self.write_atomic(&values)
    }
}

// =============================================================================
// TYPED ACCESS
// =============================================================================

/// Typed handle over a [`PreferenceStore`]. Cheap to clone.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    #[must_use]
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferences::new()))
    }

    /// Teacher training text; empty when never saved.
    #[must_use]
    pub fn training_text(&self) -> String {
        self.store.get(KEY_TRAINING_TEXT).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns an error when the store cannot persist the value.
    pub fn save_training_text(&self, text: &str) -> Result<(), PreferenceError> {
        self.store.set(KEY_TRAINING_TEXT, text)
    }

    /// Most-recent-first student names. Corrupt data reads as empty.
    #[must_use]
    pub fn recent_names(&self) -> Vec<String> {
        let Some(raw) = self.store.get(KEY_RECENT_NAMES) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "preferences: failed to parse recent names");
            Vec::new()
        })
    }

    /// Record `name` as the most recent student name and return the new list.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot persist the list.
    pub fn remember_name(&self, name: &str) -> Result<Vec<String>, PreferenceError> {
        let names = push_recent(&self.recent_names(), name);
        self.store.set(KEY_RECENT_NAMES, &serde_json::to_string(&names)?)?;
        Ok(names)
    }
}

/// Put trimmed `name` first, drop duplicates, keep at most
/// [`MAX_RECENT_NAMES`]. A blank name leaves the list unchanged.
#[must_use]
pub fn push_recent(names: &[String], name: &str) -> Vec<String> {
    let name = name.trim();
    let mut out: Vec<String> = Vec::with_capacity(MAX_RECENT_NAMES);
    if !name.is_empty() {
        out.push(name.to_string());
    }
    for existing in names {
        if out.len() == MAX_RECENT_NAMES {
            break;
        }
        if !out.contains(existing) {
            out.push(existing.clone());
        }
    }
    out
}

#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;
