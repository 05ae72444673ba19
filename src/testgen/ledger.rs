// src/testgen/ledger.rs
//
// Record of which source modules were merged into which test file.
// Lets the merger recognise a file it created wholesale (no section
// marker) as already holding that module's tests.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

pub const LEDGER_FILE: &str = ".osmotest-ledger.json";
const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub module: String,
    pub sha256: String,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeLedger {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Vec<LedgerEntry>>,
}

impl MergeLedger {
    pub fn path_in(test_root: &Path) -> PathBuf {
        test_root.join(LEDGER_FILE)
    }

    /// Missing file means an empty ledger; unreadable or corrupt is an error.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| LedgerError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut out = self.clone();
        out.version = LEDGER_VERSION;
        let text = serde_json::to_string_pretty(&out).map_err(|source| LedgerError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text + "\n").map_err(io_err)
    }

    pub fn contains(&self, destination: &Path, module: &str) -> bool {
        self.entries
            .get(&key(destination))
            .is_some_and(|v| v.iter().any(|e| e.module == module))
    }

    pub fn record(&mut self, destination: &Path, module: &str, content: &str) {
        let list = self.entries.entry(key(destination)).or_default();
        if list.iter().any(|e| e.module == module) {
            return;
        }
        list.push(LedgerEntry {
            module: module.to_string(),
            sha256: content_hash(content),
            recorded_at: Utc::now().to_rfc3339(),
        });
    }

    /// A destination written wholesale holds exactly one module; entries
    /// left over from an earlier, since-deleted file are dropped.
    pub fn reset(&mut self, destination: &Path, module: &str, content: &str) {
        self.entries.remove(&key(destination));
        self.record(destination, module, content);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(destination: &Path) -> String {
    destination.to_string_lossy().replace('\\', "/")
}

pub fn content_hash(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_once_per_module() {
        let mut l = MergeLedger::default();
        let dest = Path::new("tests/test_models.py");

        l.record(dest, "app/models.py", "a");
        l.record(dest, "app/models.py", "b");

        assert!(l.contains(dest, "app/models.py"));
        assert!(!l.contains(dest, "app/models"));
        assert_eq!(l.entries[&key(dest)].len(), 1);
        assert_eq!(l.entries[&key(dest)][0].sha256, content_hash("a"));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = MergeLedger::path_in(dir.path());

        let mut l = MergeLedger::load(&path).unwrap();
        assert!(l.is_empty());
        l.record(Path::new("tests/test_routes.py"), "app/routes.py", "x");
        l.save(&path).unwrap();

        let back = MergeLedger::load(&path).unwrap();
        assert!(back.contains(Path::new("tests/test_routes.py"), "app/routes.py"));
    }

    #[test]
    fn corrupt_ledger_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = MergeLedger::path_in(dir.path());
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MergeLedger::load(&path),
            Err(LedgerError::Corrupt { .. })
        ));
    }

    #[test]
    fn reset_forgets_previous_modules() {
        let mut l = MergeLedger::default();
        let dest = Path::new("tests/test_models.py");

        l.record(dest, "app/models.py", "a");
        l.reset(dest, "app/models/user.py", "b");

        assert!(!l.contains(dest, "app/models.py"));
        assert!(l.contains(dest, "app/models/user.py"));
        assert_eq!(l.entries[&key(dest)].len(), 1);
    }
}
