//! Local file backend.
//!
//! The whole state lives in one JSON document. Saves go through a sibling
//! temporary file that is renamed over the target, so readers only ever see
//! the previous or the new document.

use crate::backend::Backend;
use crate::binding::AccessBinding;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk layout of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    #[serde(rename = "type")]
    kind: String,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    bindings: Vec<AccessBinding>,
}

/// Backend persisting bindings to a single file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    kind: Option<String>,
    open: bool,
}

impl FileBackend {
    /// Create a backend for the given state file. Nothing is touched on disk
    /// until [`Backend::create_or_open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            open: false,
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::storage(format!(
                "state file {} is not open",
                self.path.display()
            )))
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, content: &[u8]) -> Result<()> {
        let tmp = self.temp_path();
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });

        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::storage(format!(
                "failed to write state file {}: {e}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn create_or_open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }

        if self.path.is_dir() {
            return Err(Error::StorageUnavailable {
                backend: self.name(),
                message: format!("{} is a directory", self.path.display()),
            });
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::StorageUnavailable {
                backend: "file",
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        log::debug!("Opened state file {}", self.path.display());
        self.open = true;
        Ok(())
    }

    fn save_type(&mut self, tag: &str) -> Result<()> {
        self.ensure_open()?;
        self.kind = Some(tag.to_string());
        Ok(())
    }

    fn save_bindings(&mut self, bindings: &HashSet<AccessBinding>) -> Result<()> {
        self.ensure_open()?;
        let kind = self
            .kind
            .clone()
            .ok_or_else(|| Error::storage("no collection type recorded before save"))?;

        let mut sorted: Vec<AccessBinding> = bindings.iter().cloned().collect();
        sorted.sort();

        let document = StateDocument {
            kind,
            saved_at: Utc::now(),
            bindings: sorted,
        };
        let content = serde_json::to_vec_pretty(&document)?;
        self.write_atomically(&content)?;

        log::debug!(
            "Saved {} bindings to {}",
            document.bindings.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&mut self) -> Result<HashSet<AccessBinding>> {
        self.ensure_open()?;

        if !self.path.exists() {
            log::debug!(
                "State file {} does not exist, starting empty",
                self.path.display()
            );
            return Ok(HashSet::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::storage(format!(
                "failed to read state file {}: {e}",
                self.path.display()
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(HashSet::new());
        }

        let document: StateDocument = serde_json::from_str(&content).map_err(|e| {
            Error::storage(format!(
                "failed to parse state file {}: {e}",
                self.path.display()
            ))
        })?;

        log::debug!(
            "Loaded {} '{}' entries from {}",
            document.bindings.len(),
            document.kind,
            self.path.display()
        );
        Ok(document.bindings.into_iter().collect())
    }

    fn close(&mut self) {
        self.open = false;
        self.kind = None;
    }
}
