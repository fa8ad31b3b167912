//! Persisted model library: identifier → [`ModelConfigRecord`].
//!
//! The whole mapping is read at once and written at once. Writes go to a
//! sibling temp file which is synced and then renamed over the target, so a
//! reader sees either the previous library or the new one.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::record::{short_name, validate_identifier, ModelConfigRecord};
use crate::server::config::ConnectSettings;
use crate::server::errors::{ConnectError, Result};

/// The in-memory form of the library file.
pub type ModelConfigs = BTreeMap<String, ModelConfigRecord>;

/// File-backed model library.
#[derive(Debug, Clone)]
pub struct ModelLibrary {
    path: PathBuf,
}

impl ModelLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &ConnectSettings) -> Self {
        Self::new(settings.library_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─── Whole-file operations ──────────────────────────────────────────────

    /// Read the full mapping. A missing file is an empty library.
    pub fn load(&self) -> Result<ModelConfigs> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no model library yet");
            return Ok(ModelConfigs::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.storage_error(e))?;
        if content.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "model library file is empty");
            return Ok(ModelConfigs::new());
        }

        let configs: ModelConfigs =
            serde_json::from_str(&content).map_err(|e| ConnectError::CorruptConfiguration {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        for (identifier, record) in &configs {
            record
                .validate(identifier)
                .map_err(|e| ConnectError::CorruptConfiguration {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })?;
        }

        tracing::info!(
            count = configs.len(),
            path = %self.path.display(),
            "loaded model library"
        );
        Ok(configs)
    }

    /// Replace the persisted mapping with `configs`.
    ///
    /// Every record is validated first; nothing touches the disk if one fails.
    pub fn save(&self, configs: &ModelConfigs) -> Result<()> {
        for (identifier, record) in configs {
            record.validate(identifier)?;
        }

        let content = serde_json::to_string_pretty(configs).map_err(|e| ConnectError::Storage {
            path: self.path.display().to_string(),
            reason: format!("failed to serialize library: {e}"),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let written = write_synced(&tmp_path, content.as_bytes())
            .and_then(|()| std::fs::rename(&tmp_path, &self.path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(self.storage_error(e));
        }

        tracing::debug!(
            count = configs.len(),
            path = %self.path.display(),
            "saved model library"
        );
        Ok(())
    }

    // ─── Single-record operations ───────────────────────────────────────────

    /// The record for `identifier`, falling back to its short name.
    pub fn get(&self, identifier: &str) -> Result<ModelConfigRecord> {
        let configs = self.load()?;
        lookup(&configs, identifier)
            .cloned()
            .ok_or_else(|| ConnectError::UnknownModel {
                identifier: identifier.to_string(),
            })
    }

    /// Insert or replace one record. Meant for explicit user edits.
    pub fn upsert(&self, identifier: &str, record: ModelConfigRecord) -> Result<()> {
        validate_identifier(identifier)?;
        record.validate(identifier)?;

        let mut configs = self.load()?;
        let replaced = configs.insert(identifier.to_string(), record).is_some();
        self.save(&configs)?;

        tracing::info!(model = %identifier, replaced, "model config updated");
        Ok(())
    }

    /// Remove one record. Returns whether it existed.
    pub fn remove(&self, identifier: &str) -> Result<bool> {
        let mut configs = self.load()?;
        if configs.remove(identifier).is_none() {
            return Ok(false);
        }
        self.save(&configs)?;

        tracing::info!(model = %identifier, "model config removed");
        Ok(true)
    }

    /// Every identifier in the library, sorted.
    pub fn model_names(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    fn storage_error(&self, e: std::io::Error) -> ConnectError {
        ConnectError::Storage {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

/// Exact key first, then a record stored under the identifier's short name,
/// but only when that record's endpoint names `identifier` itself.
fn lookup<'a>(configs: &'a ModelConfigs, identifier: &str) -> Option<&'a ModelConfigRecord> {
    if let Some(record) = configs.get(identifier) {
        return Some(record);
    }
    let short = short_name(identifier);
    if short == identifier {
        return None;
    }
    configs
        .get(short)
        .filter(|record| record.request_model(short) == identifier)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
