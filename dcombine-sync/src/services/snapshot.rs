//! Snapshot store
//!
//! A JSON file caching previously harvested lists and contacts plus the
//! remediation ledger, so a combine run can start without re-harvesting:
//!
//! ```json
//! {"contacts": [...], "cclists": [...], "to_remediate": {"bad_phone_nums": {}, "bad_m2m": {}}}
//! ```
//!
//! Writes go to a temporary file that is fsynced and renamed over the
//! target, so readers never see a half-written snapshot.

use dcombine_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::models::RemediationLedger;

/// Snapshot file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contacts: Vec<Value>,
    #[serde(default)]
    pub cclists: Vec<Value>,
    /// Older snapshots spell this key `to_remidate`
    #[serde(default, alias = "to_remidate")]
    pub to_remediate: RemediationLedger,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.cclists.is_empty()
    }
}

/// How `save` treats an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Keep existing entries and append records whose id is new
    Merge,
    /// Replace the file wholesale
    Replace,
}

/// Remote id of a record as a string, whether sent as a string or a number
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Append records from `incoming` whose id is not already in `existing`
///
/// Records without an id are always appended.
pub fn merge_records(existing: &mut Vec<Value>, incoming: &[Value]) -> usize {
    let mut seen: HashSet<String> = existing.iter().filter_map(record_id).collect();
    let mut added = 0;
    for record in incoming {
        if let Some(id) = record_id(record) {
            if !seen.insert(id) {
                continue;
            }
        }
        existing.push(record.clone());
        added += 1;
    }
    added
}

/// Single-writer JSON snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; an empty file reads as an empty snapshot
    pub fn load(&self) -> Result<Snapshot> {
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            info!("File '{}' is 0 bytes, treating as empty snapshot", self.path.display());
            return Ok(Snapshot::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            error!("Could not read JSON file {}: {}", self.path.display(), e);
            Error::Json(e)
        })
    }

    /// Load into `target`
    ///
    /// With `override_existing` false and `target` already populated this is
    /// a no-op: caller state is preserved and nothing is read. Returns
    /// whether `target` was replaced.
    pub fn load_into(&self, target: &mut Snapshot, override_existing: bool) -> Result<bool> {
        if !override_existing && !target.is_empty() {
            info!(
                contacts = target.contacts.len(),
                lists = target.cclists.len(),
                "Records already loaded, not overriding"
            );
            return Ok(false);
        }

        debug!("Overriding contacts and lists from {}", self.path.display());
        *target = self.load()?;
        Ok(true)
    }

    /// Write `snapshot` to the file
    ///
    /// In `Merge` mode the existing file is read first and only records with
    /// a new id are appended; existing entries are never overwritten. A
    /// missing or empty file merges as empty. Returns what was written.
    pub fn save(&self, snapshot: &Snapshot, mode: SaveMode) -> Result<Snapshot> {
        let data = match mode {
            SaveMode::Replace => snapshot.clone(),
            SaveMode::Merge => {
                let mut data = if self.path.exists() {
                    self.load()?
                } else {
                    Snapshot::default()
                };
                let contacts = merge_records(&mut data.contacts, &snapshot.contacts);
                let lists = merge_records(&mut data.cclists, &snapshot.cclists);
                data.to_remediate.merge(&snapshot.to_remediate);
                debug!(contacts, lists, "Merged new records into snapshot");
                data
            }
        };

        self.write_atomic(&data)?;
        debug!("Objects dumped successfully to {}", self.path.display());
        Ok(data)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomic(&self, data: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        let bytes = serde_json::to_vec(data)?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}
