//! On-disk cache directory: one record file per URI.
//!
//! Records are written to a temp file in the cache directory and then renamed
//! over the final path, so a reader sees either the old record or the new one,
//! never a partial file. A failed rename drops the temp file and leaves the
//! previous record untouched.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;
use tempfile::NamedTempFile;
use url::Url;

use crate::config::CacheConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::key::{CacheKey, LEGACY_EXT, RECORD_EXT};
use crate::record::{self, CacheRecord, RecordError, RecordMeta};

/// Prefix of temp files staged inside the cache directory.
pub const TEMP_PREFIX: &str = ".tmp";

/// A record read from disk together with its timestamp.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: CacheRecord,
    /// Modification time of the entry file: when it was last written or revalidated.
    pub modified: SystemTime,
    /// True when read from a bare-payload legacy entry.
    pub legacy: bool,
}

/// Record metadata (no payload) plus timestamp, for inspection.
#[derive(Debug, Clone)]
pub struct StoredMeta {
    pub meta: RecordMeta,
    pub modified: SystemTime,
    pub path: PathBuf,
}

/// A fully written record waiting to be renamed into place.
/// Dropping it without [`commit`](Self::commit) deletes the temp file.
#[derive(Debug)]
pub struct StagedRecord {
    file: NamedTempFile,
}

impl StagedRecord {
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically rename the staged file over `final_path`.
    pub fn commit(self, final_path: &Path) -> io::Result<()> {
        self.file
            .persist(final_path)
            .map(|_| ())
            .map_err(|e| e.error)
    }
}

#[derive(Clone)]
pub struct CacheStore {
    dir: PathBuf,
    read_legacy: bool,
    sink: Arc<dyn DiagnosticSink>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, read_legacy: bool, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            dir: dir.into(),
            read_legacy,
            sink,
        }
    }

    pub fn from_config(cfg: &CacheConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::new(cfg.cache_dir.clone(), cfg.read_legacy, sink)
    }

    pub fn record_path(&self, url: &Url) -> PathBuf {
        self.dir.join(CacheKey::from_url(url).file_name(RECORD_EXT))
    }

    pub fn legacy_path(&self, url: &Url) -> PathBuf {
        self.dir.join(CacheKey::from_url(url).file_name(LEGACY_EXT))
    }

    /// Modification time of the record file, if one exists.
    pub fn modified(&self, url: &Url) -> Option<SystemTime> {
        fs::metadata(self.record_path(url))
            .and_then(|m| m.modified())
            .ok()
    }

    /// Load the record for `url`.
    ///
    /// Returns `None` when there is no entry or the entry cannot be read; an
    /// unreadable entry emits a diagnostic and counts as a miss.
    pub fn load(&self, url: &Url) -> Option<StoredRecord> {
        let path = self.record_path(url);
        match read_record(&path) {
            Ok(Some(stored)) => return Some(stored),
            Ok(None) => {}
            Err(e) => {
                self.corrupt(url, &e);
                return None;
            }
        }
        if self.read_legacy {
            return self.load_legacy(url);
        }
        None
    }

    /// Load record metadata without reading the payload.
    pub fn load_meta(&self, url: &Url) -> Result<Option<StoredMeta>, RecordError> {
        let path = self.record_path(url);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = file.metadata()?.modified()?;
        let meta = record::read_meta(BufReader::new(file))?;
        Ok(Some(StoredMeta {
            meta,
            modified,
            path,
        }))
    }

    /// Write `record` to a temp file in the cache directory (created if needed).
    pub fn stage(&self, record: &CacheRecord) -> io::Result<StagedRecord> {
        fs::create_dir_all(&self.dir)?;
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)?;
        let writer = record::write(record, BufWriter::new(file)).map_err(into_io)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.as_file().sync_all()?;
        Ok(StagedRecord { file })
    }

    /// Replace the record for `url` with `record`.
    pub fn write(&self, url: &Url, record: &CacheRecord) -> io::Result<()> {
        let staged = self.stage(record)?;
        staged.commit(&self.record_path(url))
    }

    /// Mark the record for `url` as just fetched without rewriting it.
    pub fn touch(&self, url: &Url) -> io::Result<()> {
        filetime::set_file_mtime(self.record_path(url), FileTime::now())
    }

    fn load_legacy(&self, url: &Url) -> Option<StoredRecord> {
        let path = self.legacy_path(url);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                self.corrupt(url, &e);
                return None;
            }
        };
        match fs::read(&path) {
            Ok(payload) => Some(StoredRecord {
                record: CacheRecord::success(payload, None),
                modified,
                legacy: true,
            }),
            Err(e) => {
                self.corrupt(url, &e);
                None
            }
        }
    }

    fn corrupt(&self, url: &Url, error: &dyn std::fmt::Display) {
        self.sink.emit(Diagnostic::CorruptEntry {
            uri: url.to_string(),
            error: error.to_string(),
        });
    }
}

fn read_record(path: &Path) -> Result<Option<StoredRecord>, RecordError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let modified = file.metadata()?.modified()?;
    let record = record::read(BufReader::new(file))?;
    Ok(Some(StoredRecord {
        record,
        modified,
        legacy: false,
    }))
}

fn into_io(e: RecordError) -> io::Error {
    match e {
        RecordError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::record::Status;
    use std::time::Duration;

    fn store(dir: &Path) -> (CacheStore, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (CacheStore::new(dir, true, sink.clone()), sink)
    }

    fn url() -> Url {
        Url::parse("http://example/reference.X").unwrap()
    }

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(TEMP_PREFIX))
            .collect()
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = store(dir.path());
        assert!(store.load(&url()).is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("nested").join("cache");
        let (store, _) = store(&cache_dir);
        let record = CacheRecord::success(b"B".to_vec(), Some("abc".into()));
        store.write(&url(), &record).unwrap();

        let path = store.record_path(&url());
        assert_eq!(path.parent(), Some(cache_dir.as_path()));
        assert!(path.to_string_lossy().ends_with(".zip"));

        let loaded = store.load(&url()).unwrap();
        assert_eq!(loaded.record, record);
        assert!(!loaded.legacy);
        assert!(temp_files(&cache_dir).is_empty());
    }

    #[test]
    fn staged_but_uncommitted_write_leaves_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        store
            .write(&url(), &CacheRecord::success(b"old".to_vec(), Some("v1".into())))
            .unwrap();
        let before = fs::read(store.record_path(&url())).unwrap();

        let staged = store
            .stage(&CacheRecord::success(b"new".to_vec(), Some("v2".into())))
            .unwrap();
        assert!(staged.temp_path().exists());
        drop(staged);

        assert_eq!(fs::read(store.record_path(&url())).unwrap(), before);
        assert!(temp_files(dir.path()).is_empty());
        let loaded = store.load(&url()).unwrap();
        assert_eq!(loaded.record.payload.as_deref(), Some(&b"old"[..]));
    }

    #[test]
    fn failed_rename_discards_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        // A non-empty directory at the final path makes the rename fail.
        let final_path = store.record_path(&url());
        fs::create_dir_all(final_path.join("blocker")).unwrap();

        let err = store.write(&url(), &CacheRecord::not_found());
        assert!(err.is_err());
        assert!(temp_files(dir.path()).is_empty());
        assert!(final_path.join("blocker").is_dir());
    }

    #[test]
    fn corrupt_entry_is_miss_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let (store, sink) = store(dir.path());
        fs::write(store.record_path(&url()), b"definitely not a zip").unwrap();
        assert!(store.load(&url()).is_none());
        assert!(matches!(
            sink.events().as_slice(),
            [Diagnostic::CorruptEntry { .. }]
        ));
    }

    #[test]
    fn touch_refreshes_mtime_only() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        let record = CacheRecord::success(b"B".to_vec(), Some("abc".into()));
        store.write(&url(), &record).unwrap();
        let path = store.record_path(&url());
        let old = SystemTime::now() - Duration::from_secs(2 * 86_400);
        filetime::set_file_mtime(&path, FileTime::from_system_time(old)).unwrap();
        let bytes = fs::read(&path).unwrap();

        store.touch(&url()).unwrap();

        let modified = store.modified(&url()).unwrap();
        assert!(modified > old + Duration::from_secs(86_400));
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn touch_without_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        assert!(store.touch(&url()).is_err());
    }

    #[test]
    fn legacy_entry_read_when_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        fs::write(store.legacy_path(&url()), b"<reference anchor='X'/>").unwrap();
        let loaded = store.load(&url()).unwrap();
        assert!(loaded.legacy);
        assert_eq!(loaded.record.status, Status::Success);
        assert!(loaded.record.validator.is_none());
        assert_eq!(
            loaded.record.payload.as_deref(),
            Some(&b"<reference anchor='X'/>"[..])
        );
    }

    #[test]
    fn record_takes_precedence_over_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        fs::write(store.legacy_path(&url()), b"legacy").unwrap();
        store
            .write(&url(), &CacheRecord::success(b"current".to_vec(), None))
            .unwrap();
        let loaded = store.load(&url()).unwrap();
        assert!(!loaded.legacy);
        assert_eq!(loaded.record.payload.as_deref(), Some(&b"current"[..]));
        assert!(store.legacy_path(&url()).exists());
    }

    #[test]
    fn legacy_ignored_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::default());
        let store = CacheStore::new(dir.path(), false, sink);
        fs::write(store.legacy_path(&url()), b"legacy").unwrap();
        assert!(store.load(&url()).is_none());
    }

    #[test]
    fn load_meta_skips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path());
        assert!(store.load_meta(&url()).unwrap().is_none());
        store
            .write(&url(), &CacheRecord::redirect(308, "https://example/reference.X".into()))
            .unwrap();
        let meta = store.load_meta(&url()).unwrap().unwrap();
        assert_eq!(meta.meta.status, Status::Redirect(308));
        assert_eq!(meta.meta.payload_len, None);
        assert_eq!(meta.path, store.record_path(&url()));
    }
}
