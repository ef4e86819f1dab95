//! File-backed single-slot result queue
//!
//! One JSON file per record, named `<execution id>.json`, inside a
//! dedicated results directory. Saving evicts every stored record before
//! writing the new one; reading a record deletes it.

use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use summon_relay_core::{
    ExecutionId, RawResult, RecordMeta, RecordSummary, RelayError, Result, ResultRecord,
    ResultType, classify, normalize_payload,
};
use tracing::{debug, info, warn};

const RECORD_EXTENSION: &str = "json";

/// Single-slot, consume-once result storage
pub trait ResultStore: Send + Sync {
    /// Produce a fresh execution id
    fn generate_execution_id(&self) -> ExecutionId {
        ExecutionId::new()
    }

    /// Replace whatever is queued with a new record
    fn save(&self, id: &ExecutionId, raw: RawResult) -> Result<RecordMeta>;

    /// Read and remove the record with this id
    fn fetch(&self, id: &ExecutionId) -> Result<Option<ResultRecord>>;

    /// Read and remove the queued record, if any
    fn fetch_current(&self) -> Result<Option<ResultRecord>>;

    /// Whether a record is queued, without consuming it
    fn has_result(&self) -> Result<bool>;

    /// Remove a record without reading it
    fn delete(&self, id: &ExecutionId) -> Result<bool>;

    /// Summaries of stored records, newest first
    fn list(&self, limit: usize, result_type: Option<&ResultType>) -> Result<Vec<RecordSummary>>;

    /// Remove every stored record
    fn clear(&self) -> Result<usize>;
}

/// [`ResultStore`] over a directory of JSON files.
///
/// All operations on one store are serialized behind a mutex so that
/// evict+write and read+delete cannot interleave within the process.
/// Several processes sharing the directory are not coordinated.
pub struct FsResultStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FsResultStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| RelayError::storage(format!("create {}", dir.display()), e))?;
        info!("Result store initialized at {}", dir.display());
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives on disk, so a panic elsewhere leaves nothing to repair
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_path(&self, id: &ExecutionId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Record files in file-name order
    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| RelayError::storage(format!("list {}", self.dir.display()), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| RelayError::storage(format!("list {}", self.dir.display()), e))?;
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION);
            if is_record && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn evict_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.record_files()? {
            if remove_if_present(&path)? {
                info!("Evicted queued result {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Write through a temp file in the same directory so a half-written
    /// record is never visible under its final name.
    fn write_record(&self, record: &ResultRecord) -> Result<PathBuf> {
        let path = self.record_path(&record.execution_id);
        let mut tmp = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| RelayError::storage(format!("create temp in {}", self.dir.display()), e))?;

        let bytes = serde_json::to_vec_pretty(record)?;
        tmp.write_all(&bytes)
            .map_err(|e| RelayError::storage(format!("write {}", path.display()), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| RelayError::storage(format!("sync {}", path.display()), e))?;
        tmp.persist(&path)
            .map_err(|e| RelayError::storage(format!("persist {}", path.display()), e.error))?;
        Ok(path)
    }

    /// Read a record file and delete it. A file that cannot be decoded is
    /// deleted as well so it cannot block the queue.
    fn take(&self, path: &Path) -> Result<Option<ResultRecord>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RelayError::storage(format!("read {}", path.display()), e)),
        };

        let decoded = serde_json::from_slice::<ResultRecord>(&bytes);
        remove_if_present(path)?;

        match decoded {
            Ok(record) => {
                info!("Consumed result {} ({})", record.execution_id, record.result_type);
                Ok(Some(record))
            }
            Err(e) => {
                warn!("Dropped undecodable record {}: {}", path.display(), e);
                Err(RelayError::CorruptRecord(format!("{}: {}", path.display(), e)))
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RelayError::storage(format!("delete {}", path.display()), e)),
    }
}

impl ResultStore for FsResultStore {
    fn save(&self, id: &ExecutionId, raw: RawResult) -> Result<RecordMeta> {
        if !id.is_safe_key() {
            return Err(RelayError::Storage(format!(
                "execution id {:?} cannot name a record file",
                id.as_str()
            )));
        }

        let data = normalize_payload(raw);
        let result_type = classify(&data);
        let record = ResultRecord {
            execution_id: id.clone(),
            timestamp: Utc::now(),
            result_type,
            data,
        };

        let _guard = self.guard();
        let evicted = self.evict_all()?;
        let path = self.write_record(&record)?;
        info!(
            "Saved result {} as {} (evicted {})",
            record.execution_id, record.result_type, evicted
        );

        Ok(RecordMeta {
            execution_id: record.execution_id,
            path,
            timestamp: record.timestamp,
            result_type: record.result_type,
        })
    }

    fn fetch(&self, id: &ExecutionId) -> Result<Option<ResultRecord>> {
        if !id.is_safe_key() {
            debug!("Rejected lookup for unusable id {:?}", id.as_str());
            return Ok(None);
        }
        let _guard = self.guard();
        self.take(&self.record_path(id))
    }

    fn fetch_current(&self) -> Result<Option<ResultRecord>> {
        let _guard = self.guard();
        let files = self.record_files()?;
        let Some(first) = files.first() else {
            return Ok(None);
        };
        if files.len() > 1 {
            // Only reachable when another writer shares the directory
            warn!(
                "{} records queued; consuming {} and leaving {} in place",
                files.len(),
                first.display(),
                files.len() - 1
            );
        }
        self.take(first)
    }

    fn has_result(&self) -> Result<bool> {
        let _guard = self.guard();
        Ok(!self.record_files()?.is_empty())
    }

    fn delete(&self, id: &ExecutionId) -> Result<bool> {
        if !id.is_safe_key() {
            return Ok(false);
        }
        let _guard = self.guard();
        let removed = remove_if_present(&self.record_path(id))?;
        if removed {
            info!("Deleted result {}", id);
        }
        Ok(removed)
    }

    fn list(&self, limit: usize, result_type: Option<&ResultType>) -> Result<Vec<RecordSummary>> {
        let _guard = self.guard();
        let mut summaries = Vec::new();

        for path in self.record_files()? {
            let record = match fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<ResultRecord>(&bytes).map_err(|e| e.to_string())
                }) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                    continue;
                }
            };

            if result_type.is_some_and(|wanted| *wanted != record.result_type) {
                continue;
            }

            summaries.push(RecordSummary {
                execution_id: record.execution_id,
                timestamp: record.timestamp,
                result_type: record.result_type,
                path,
            });
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        summaries.truncate(limit);
        Ok(summaries)
    }

    fn clear(&self) -> Result<usize> {
        let _guard = self.guard();
        self.evict_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, FsResultStore) {
        let dir = tempdir().unwrap();
        let store = FsResultStore::open(dir.path().join("mcp_results")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_only_latest_save_is_kept() {
        let (_dir, store) = store();
        let mut last = None;
        for n in 0..5 {
            let id = store.generate_execution_id();
            store
                .save(&id, RawResult::Structured(json!({"comment": format!("round {n}")})))
                .unwrap();
            last = Some(id);
        }

        assert_eq!(store.record_files().unwrap().len(), 1);
        let record = store.fetch_current().unwrap().unwrap();
        assert_eq!(Some(record.execution_id), last);
        assert_eq!(record.data["comment"], "round 4");
        assert!(!store.has_result().unwrap());
    }

    #[test]
    fn test_has_result_tracks_save_and_fetch() {
        let (_dir, store) = store();
        assert!(!store.has_result().unwrap());

        let id = store.generate_execution_id();
        store.save(&id, r#"{"comment": "x"}"#.into()).unwrap();
        assert!(store.has_result().unwrap());
        assert!(store.has_result().unwrap(), "probe must not consume");

        store.fetch(&id).unwrap().unwrap();
        assert!(!store.has_result().unwrap());
    }

    #[test]
    fn test_fetch_consumes_once() {
        let (_dir, store) = store();
        let id = store.generate_execution_id();
        store.save(&id, r#"{"hp_changes": {"1": 80}}"#.into()).unwrap();

        assert!(store.fetch(&id).unwrap().is_some());
        assert!(store.fetch(&id).unwrap().is_none());

        store.save(&id, r#"{"comment": "again"}"#.into()).unwrap();
        assert!(store.fetch_current().unwrap().is_some());
        assert!(store.fetch_current().unwrap().is_none());
    }

    #[test]
    fn test_fetch_unknown_id_is_absent() {
        let (_dir, store) = store();
        assert!(store.fetch(&ExecutionId::new()).unwrap().is_none());
        assert!(
            store
                .fetch(&ExecutionId::from_string("../outside"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_save_fails_when_directory_is_gone() {
        let (_dir, store) = store();
        fs::remove_dir_all(store.dir()).unwrap();

        let err = store
            .save(&store.generate_execution_id(), r#"{"comment": "x"}"#.into())
            .unwrap_err();
        assert!(matches!(err, RelayError::Storage(_)), "{err}");
    }

    #[test]
    fn test_failed_write_leaves_no_partial_record() {
        let (_dir, store) = store();
        let id = store.generate_execution_id();
        // A directory squatting on the record name makes the final rename fail
        fs::create_dir(store.record_path(&id)).unwrap();

        let err = store.save(&id, r#"{"comment": "x"}"#.into()).unwrap_err();
        assert!(matches!(err, RelayError::Storage(_)), "{err}");

        let leftovers: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        assert!(!store.has_result().unwrap());
        assert!(store.fetch_current().unwrap().is_none());
    }

    #[test]
    fn test_save_rejects_unusable_id() {
        let (_dir, store) = store();
        let err = store
            .save(&ExecutionId::from_string("a/b"), "{}".into())
            .unwrap_err();
        assert!(matches!(err, RelayError::Storage(_)));
    }

    #[test]
    fn test_malformed_json_is_saved_as_raw_result() {
        let (_dir, store) = store();
        let id = store.generate_execution_id();
        let meta = store.save(&id, "not json".into()).unwrap();
        assert_eq!(meta.result_type, ResultType::GeneralJson);
        assert_eq!(meta.execution_id, id);
        assert!(meta.path.ends_with(format!("{}.json", id)));

        let record = store.fetch(&id).unwrap().unwrap();
        assert_eq!(serde_json::Value::Object(record.data), json!({"rawResult": "not json"}));
    }

    #[test]
    fn test_round_trip_preserves_payload() {
        let (_dir, store) = store();
        let submitted = json!({
            "name": "Drake",
            "hp": 500,
            "specialMove": "Flame",
            "description": "d",
            "nested": {"list": [1, 2.5, null, "x"], "flag": true}
        });
        let id = store.generate_execution_id();
        let meta = store.save(&id, submitted.clone().into()).unwrap();
        assert_eq!(meta.result_type, ResultType::CreatureData);

        let record = store.fetch_current().unwrap().unwrap();
        assert_eq!(serde_json::Value::Object(record.data), submitted);
        assert_eq!(record.timestamp, meta.timestamp);
        assert_eq!(record.result_type, ResultType::CreatureData);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = store();
        let id = store.generate_execution_id();
        store.save(&id, "{}".into()).unwrap();

        assert!(!store.delete(&ExecutionId::new()).unwrap());
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(!store.has_result().unwrap());
    }

    #[test]
    fn test_on_disk_layout() {
        let (_dir, store) = store();
        let id = store.generate_execution_id();
        let meta = store.save(&id, r#"{"comment": "x"}"#.into()).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&meta.path).unwrap()).unwrap();
        assert_eq!(value["executionId"], id.as_str());
        assert_eq!(value["resultType"], "finish_comment");
        assert_eq!(value["data"], json!({"comment": "x"}));
        assert!(value["timestamp"].is_string());

        let stray: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(stray.is_empty(), "temp files must not linger");
    }

    fn plant(store: &FsResultStore, id: &str, comment: &str) {
        let record = ResultRecord {
            execution_id: ExecutionId::from_string(id),
            timestamp: Utc::now(),
            result_type: ResultType::FinishComment,
            data: match json!({"comment": comment}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            },
        };
        store.write_record(&record).unwrap();
    }

    #[test]
    fn test_fetch_current_with_racing_records_leaves_the_rest() {
        let (_dir, store) = store();
        plant(&store, "aaa", "first");
        plant(&store, "bbb", "second");

        let record = store.fetch_current().unwrap().unwrap();
        assert_eq!(record.execution_id.as_str(), "aaa");
        assert!(store.has_result().unwrap());

        let record = store.fetch_current().unwrap().unwrap();
        assert_eq!(record.execution_id.as_str(), "bbb");
        assert!(!store.has_result().unwrap());
    }

    #[test]
    fn test_corrupt_record_is_removed_and_reported() {
        let (_dir, store) = store();
        fs::write(store.dir().join("broken.json"), b"{ not a record").unwrap();

        let err = store.fetch_current().unwrap_err();
        assert!(matches!(err, RelayError::CorruptRecord(_)));
        assert!(!store.has_result().unwrap());
        assert!(store.fetch_current().unwrap().is_none());
    }

    #[test]
    fn test_non_record_files_are_ignored() {
        let (_dir, store) = store();
        fs::write(store.dir().join("notes.txt"), b"hello").unwrap();
        fs::create_dir(store.dir().join("nested.json")).unwrap();
        assert!(!store.has_result().unwrap());
        assert_eq!(store.clear().unwrap(), 0);
    }

    #[test]
    fn test_list_filters_and_orders() {
        let (_dir, store) = store();
        plant(&store, "older", "a");
        std::thread::sleep(std::time::Duration::from_millis(5));
        plant(&store, "newer", "b");
        fs::write(store.dir().join("junk.json"), b"[]").unwrap();

        let all = store.list(50, None).unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.execution_id.as_str()).collect();
        assert_eq!(ids, ["newer", "older"]);

        assert_eq!(store.list(1, None).unwrap().len(), 1);
        assert!(store.list(50, Some(&ResultType::Attack)).unwrap().is_empty());
        assert_eq!(
            store.list(50, Some(&ResultType::FinishComment)).unwrap().len(),
            2
        );
        assert!(store.has_result().unwrap(), "listing must not consume");
    }

    #[test]
    fn test_clear_counts_evicted_records() {
        let (_dir, store) = store();
        plant(&store, "a", "x");
        plant(&store, "b", "y");
        assert_eq!(store.clear().unwrap(), 2);
        assert!(!store.has_result().unwrap());
    }

    #[test]
    fn test_concurrent_saves_leave_one_record() {
        let (_dir, store) = store();
        let store = std::sync::Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let id = store.generate_execution_id();
                    store
                        .save(&id, RawResult::Structured(json!({"n": n})))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.record_files().unwrap().len(), 1);
    }
}
