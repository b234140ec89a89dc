//! Durable translation cache and completion ledger.
//!
//! Everything that must survive a restart lives in one JSON document: the
//! source → translation cache, which sheets are completed, per-sheet progress,
//! failed units, and the last input file and selection. The document is loaded
//! once when the store is opened and overwritten wholesale on every flush.
//!
//! A missing or unparsable document is never fatal; the store simply starts
//! fresh.

use crate::error::StateError;
use crate::selection::SelectionSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Version tag written into new state documents
pub const STATE_VERSION: &str = "1.0";

/// Default number of cache insertions between flushes
pub const DEFAULT_FLUSH_EVERY: usize = 50;

/// A unit whose retries were exhausted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTranslation {
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// The persisted state document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub file_path: String,
    pub selected_sheets: SelectionSet,
    pub completed_sheets: BTreeMap<String, DateTime<Utc>>,
    pub sheet_progress: BTreeMap<String, f64>,
    pub translation_cache: BTreeMap<String, String>,
    pub failed_translations: BTreeMap<String, FailedTranslation>,
}

impl Default for StateDocument {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION.to_string(),
            created_at: now,
            last_updated: now,
            file_path: String::new(),
            selected_sheets: SelectionSet::new(),
            completed_sheets: BTreeMap::new(),
            sheet_progress: BTreeMap::new(),
            translation_cache: BTreeMap::new(),
            failed_translations: BTreeMap::new(),
        }
    }
}

/// Single source of truth for durable translation state.
///
/// Components borrow the store explicitly; there is no global instance.
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    doc: StateDocument,
    flush_every: usize,
    unflushed_writes: usize,
}

impl StateStore {
    /// Open the state document at `path`, starting fresh if it is missing or corrupt
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = Self::load(&path);
        Self {
            path: Some(path),
            doc,
            flush_every: DEFAULT_FLUSH_EVERY,
            unflushed_writes: 0,
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: StateDocument::default(),
            flush_every: DEFAULT_FLUSH_EVERY,
            unflushed_writes: 0,
        }
    }

    /// Set how many cache insertions may accumulate before an automatic flush
    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every.max(1);
        self
    }

    fn load(path: &Path) -> StateDocument {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                return StateDocument::default();
            }
            Err(e) => {
                warn!(
                    "Failed to read state file {}: {}. Starting fresh",
                    path.display(),
                    e
                );
                return StateDocument::default();
            }
        };

        match serde_json::from_str::<StateDocument>(&content) {
            Ok(doc) => {
                info!(
                    "Loaded state from {}: {} cached translations, {} completed sheets",
                    path.display(),
                    doc.translation_cache.len(),
                    doc.completed_sheets.len()
                );
                doc
            }
            Err(e) => {
                warn!(
                    "State file {} is corrupt ({}). Starting fresh",
                    path.display(),
                    e
                );
                StateDocument::default()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &StateDocument {
        &self.doc
    }

    /// Write the whole document to disk.
    ///
    /// The document is written to a sibling temporary file first and then
    /// renamed over the target, so a crash mid-write leaves the previous
    /// version intact.
    pub fn flush(&mut self) -> Result<(), StateError> {
        self.unflushed_writes = 0;
        self.doc.last_updated = Utc::now();

        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.doc)?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Flush, logging instead of propagating failures so translation can continue
    fn flush_logged(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to save translation state: {}", e);
        }
    }

    fn note_write(&mut self) {
        self.unflushed_writes += 1;
        if self.unflushed_writes >= self.flush_every {
            self.flush_logged();
        }
    }

    // ==================== Translation cache ====================

    pub fn get(&self, source: &str) -> Option<&str> {
        self.doc.translation_cache.get(source).map(String::as_str)
    }

    pub fn put(&mut self, source: &str, translated: &str) {
        self.doc
            .translation_cache
            .insert(source.to_string(), translated.to_string());
        self.doc.failed_translations.remove(source);
        self.note_write();
    }

    pub fn cache_len(&self) -> usize {
        self.doc.translation_cache.len()
    }

    // ==================== Failures ====================

    pub fn mark_failed(&mut self, source: &str, error: &str) {
        self.doc.failed_translations.insert(
            source.to_string(),
            FailedTranslation {
                error: error.to_string(),
                timestamp: Utc::now(),
            },
        );
        self.note_write();
    }

    pub fn failed_translations(&self) -> &BTreeMap<String, FailedTranslation> {
        &self.doc.failed_translations
    }

    // ==================== Completion ledger ====================

    /// Mark a sheet as completed. The first completion timestamp is kept.
    pub fn mark_sheet_completed(&mut self, name: &str) {
        self.doc
            .completed_sheets
            .entry(name.to_string())
            .or_insert_with(Utc::now);
        self.doc.sheet_progress.insert(name.to_string(), 100.0);
        self.flush_logged();
    }

    pub fn is_sheet_completed(&self, name: &str) -> bool {
        self.doc.completed_sheets.contains_key(name)
    }

    pub fn completed_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.doc.completed_sheets.get(name).copied()
    }

    pub fn completed_sheets(&self) -> Vec<&str> {
        self.doc.completed_sheets.keys().map(String::as_str).collect()
    }

    /// Record progress; it reaches disk with the next threshold or immediate flush
    pub fn set_sheet_progress(&mut self, name: &str, percent: f64) {
        self.doc
            .sheet_progress
            .insert(name.to_string(), percent.clamp(0.0, 100.0));
        self.note_write();
    }

    pub fn get_sheet_progress(&self, name: &str) -> f64 {
        self.doc.sheet_progress.get(name).copied().unwrap_or(0.0)
    }

    /// Progress as display text, e.g. `"42.5%"`, or empty when nothing was done yet
    pub fn format_sheet_progress(&self, name: &str) -> String {
        let progress = self.get_sheet_progress(name);
        if progress > 0.0 {
            format!("{:.1}%", progress)
        } else {
            String::new()
        }
    }

    // ==================== Selection ====================

    /// Remember the input file and selection so a later run can resume them
    pub fn remember_selection(&mut self, file_path: &str, selection: &SelectionSet) {
        self.doc.file_path = file_path.to_string();
        self.doc.selected_sheets = selection.clone();
        self.flush_logged();
    }

    pub fn file_path(&self) -> &str {
        &self.doc.file_path
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.doc.selected_sheets
    }

    /// Reset everything and flush immediately
    pub fn clear(&mut self) {
        self.doc = StateDocument::default();
        self.flush_logged();
        info!("Translation state cleared");
    }
}
