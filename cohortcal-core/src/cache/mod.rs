//! Versioned export cache.
//!
//! Every (partition, format) pair owns three files in the cache directory:
//!
//! - `<stem>.<ext>`: the published document
//! - `<stem>.<ext>.meta`: JSON record `{version, generated_at, settings}`
//! - `<stem>.<ext>.lock`: advisory lock serializing regeneration
//!
//! A request serves the published document when its record matches the
//! partition's current version and the cache's export settings. Otherwise it takes the lock, re-checks (a
//! previous holder may have just regenerated), and regenerates from a store
//! snapshot. The document is renamed into place before the record is
//! written, so a record never describes a file that is not there yet.

mod lock;
mod publish;
mod record;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ExportError, ExportResult};
use crate::export::{self, ExportFormat, ExportSettings, Names};
use crate::partition::Partition;
use crate::store::EventStore;

pub use lock::EntryLock;
pub use record::CacheRecord;

/// A document ready to be served.
#[derive(Debug, Clone)]
pub struct CachedExport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub path: PathBuf,
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    /// True if this call produced the document rather than reusing it.
    pub regenerated: bool,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Served(CachedExport),
    /// The partition has no events. Nothing is published.
    NoContent,
}

/// State of one cache entry relative to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Fresh(CacheRecord),
    Stale(CacheRecord),
}

/// Paths belonging to one (partition, format) entry.
#[derive(Debug, Clone)]
struct Entry {
    path: PathBuf,
    record: PathBuf,
    lock: PathBuf,
}

impl Entry {
    fn new(dir: &Path, partition: &Partition, format: ExportFormat) -> Self {
        let name = format!("{}.{}", partition.file_stem(), format.extension());
        Entry {
            path: dir.join(&name),
            record: dir.join(format!("{}.meta", name)),
            lock: dir.join(format!("{}.lock", name)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportCache {
    store: EventStore,
    dir: PathBuf,
    settings: ExportSettings,
}

impl ExportCache {
    /// Create the cache directory if needed and sweep temp files left by
    /// interrupted publishes.
    pub fn new(
        store: EventStore,
        dir: impl Into<PathBuf>,
        settings: ExportSettings,
    ) -> ExportResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ExportError::Publish {
            path: dir.clone(),
            source,
        })?;

        let cache = ExportCache {
            store,
            dir,
            settings,
        };
        cache.remove_stale_temp_files();
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Serve the partition's document, regenerating it if it is absent or
    /// stale.
    ///
    /// Blocks while another caller (thread or process) regenerates the same
    /// entry. Callers for other entries never wait on each other.
    pub fn get_export(
        &self,
        partition: &Partition,
        format: ExportFormat,
    ) -> ExportResult<ExportOutcome> {
        let entry = Entry::new(&self.dir, partition, format);
        let key = partition.version_key();

        let current = self.store.version(&key)?;
        if let Some(export) = self.serve_if_fresh(&entry, format, current)? {
            debug!(partition = %partition, %format, version = current, "export cache hit");
            return Ok(ExportOutcome::Served(export));
        }

        debug!(partition = %partition, %format, "export stale, waiting for lock");
        let _lock = EntryLock::acquire(&entry.lock)?;

        let current = self.store.version(&key)?;
        if let Some(export) = self.serve_if_fresh(&entry, format, current)? {
            debug!(partition = %partition, %format, version = current, "regenerated by another holder");
            return Ok(ExportOutcome::Served(export));
        }

        let snapshot = self.store.snapshot(&key, &partition.query())?;
        let names = Names::new(&snapshot.rooms, &snapshot.cohorts);
        let generated = export::generate(
            format,
            partition.calendar_name(),
            &snapshot.events,
            &names,
            &self.settings,
        );

        let bytes = match generated {
            Ok(bytes) => bytes,
            Err(ExportError::NoEvents) => {
                self.clear(&entry)?;
                info!(partition = %partition, %format, version = snapshot.version, "no events to export");
                return Ok(ExportOutcome::NoContent);
            }
            Err(e) => {
                warn!(partition = %partition, %format, error = %e, "export generation failed");
                return Err(e);
            }
        };

        publish::write_atomic(&entry.path, &bytes)?;
        let record = CacheRecord {
            version: snapshot.version,
            generated_at: Utc::now(),
            settings: self.settings.fingerprint(),
        };
        record::write(&entry.record, &record)?;

        info!(
            partition = %partition,
            %format,
            version = record.version,
            events = snapshot.events.len(),
            "export regenerated"
        );

        Ok(ExportOutcome::Served(CachedExport {
            bytes,
            content_type: format.content_type(),
            path: entry.path,
            version: record.version,
            generated_at: record.generated_at,
            regenerated: true,
        }))
    }

    /// Inspect an entry without regenerating it.
    pub fn entry_state(
        &self,
        partition: &Partition,
        format: ExportFormat,
    ) -> ExportResult<EntryState> {
        let entry = Entry::new(&self.dir, partition, format);
        let current = self.store.version(&partition.version_key())?;

        Ok(match record::read(&entry.record)? {
            Some(record) if !entry.path.exists() => EntryState::Stale(record),
            Some(record) if record.matches(current, &self.settings.fingerprint()) => {
                EntryState::Fresh(record)
            }
            Some(record) => EntryState::Stale(record),
            None => EntryState::Absent,
        })
    }

    fn serve_if_fresh(
        &self,
        entry: &Entry,
        format: ExportFormat,
        current: u64,
    ) -> ExportResult<Option<CachedExport>> {
        let Some(record) = record::read(&entry.record)? else {
            return Ok(None);
        };
        if !record.matches(current, &self.settings.fingerprint()) {
            return Ok(None);
        }

        match fs::read(&entry.path) {
            Ok(bytes) => Ok(Some(CachedExport {
                bytes,
                content_type: format.content_type(),
                path: entry.path.clone(),
                version: record.version,
                generated_at: record.generated_at,
                regenerated: false,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ExportError::Publish {
                path: entry.path.clone(),
                source,
            }),
        }
    }

    /// Drop a published document that no longer has events behind it.
    /// The record goes first so it never outlives its file.
    fn clear(&self, entry: &Entry) -> ExportResult<()> {
        record::remove(&entry.record)?;
        match fs::remove_file(&entry.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ExportError::Publish {
                path: entry.path.clone(),
                source,
            }),
        }
    }

    fn remove_stale_temp_files(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };

        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(target) = name.strip_suffix(publish::TEMP_SUFFIX) else {
                continue;
            };

            // `<name>.tmp` and `<name>.meta.tmp` are both guarded by `<name>.lock`
            let owner = target.strip_suffix(".meta").unwrap_or(target);
            let lock_path = self.dir.join(format!("{}.lock", owner));
            match EntryLock::try_acquire(&lock_path) {
                Ok(Some(_lock)) => {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "could not remove temp file");
                    } else {
                        debug!(path = %path.display(), "removed stale temp file");
                    }
                }
                Ok(None) => debug!(path = %path.display(), "temp file in use, leaving it"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not check temp file"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::Cohort;
    use crate::event::NewEvent;
    use crate::store::test_support::{at, temp_store};

    fn cache_with_cohort() -> (tempfile::TempDir, ExportCache, Cohort) {
        let (dir, store) = temp_store();
        let cohort = store.insert_cohort("M1 E3A").unwrap();
        let cache =
            ExportCache::new(store, dir.path().join("exports"), ExportSettings::default()).unwrap();
        (dir, cache, cohort)
    }

    fn add(cache: &ExportCache, cohort: &Cohort, start: &str, end: &str) {
        cache
            .store()
            .insert_event(&NewEvent::new(cohort.id, at(start), at(end), "Maths"))
            .unwrap();
    }

    fn served(outcome: ExportOutcome) -> CachedExport {
        match outcome {
            ExportOutcome::Served(export) => export,
            ExportOutcome::NoContent => panic!("expected a document"),
        }
    }

    #[test]
    fn test_entry_moves_from_absent_to_fresh_to_stale() {
        let (_dir, cache, cohort) = cache_with_cohort();
        let partition = Partition::Cohort(cohort.clone());

        assert_eq!(
            cache.entry_state(&partition, ExportFormat::Ics).unwrap(),
            EntryState::Absent
        );

        add(&cache, &cohort, "2025-01-10T08:00", "2025-01-10T10:00");
        served(cache.get_export(&partition, ExportFormat::Ics).unwrap());
        assert!(matches!(
            cache.entry_state(&partition, ExportFormat::Ics).unwrap(),
            EntryState::Fresh(CacheRecord { version: 1, .. })
        ));

        add(&cache, &cohort, "2025-01-11T08:00", "2025-01-11T10:00");
        assert!(matches!(
            cache.entry_state(&partition, ExportFormat::Ics).unwrap(),
            EntryState::Stale(CacheRecord { version: 1, .. })
        ));
    }

    #[test]
    fn test_formats_are_cached_separately() {
        let (_dir, cache, cohort) = cache_with_cohort();
        add(&cache, &cohort, "2025-01-10T08:00", "2025-01-10T10:00");

        let ics = served(cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
        let csv = served(cache.get_export(&Partition::All, ExportFormat::Csv).unwrap());

        assert!(ics.regenerated && csv.regenerated);
        assert_eq!(ics.path.file_name().unwrap(), "all.ics");
        assert_eq!(csv.path.file_name().unwrap(), "all.csv");
        assert!(csv.content_type.starts_with("text/csv"));
    }

    #[test]
    fn test_missing_file_with_fresh_record_is_regenerated() {
        let (_dir, cache, cohort) = cache_with_cohort();
        add(&cache, &cohort, "2025-01-10T08:00", "2025-01-10T10:00");

        let first = served(cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
        fs::remove_file(&first.path).unwrap();

        let second = served(cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
        assert!(second.regenerated);
        assert_eq!(second.bytes, first.bytes);
    }

    #[test]
    fn test_changed_settings_make_entry_stale() {
        let (_dir, cache, cohort) = cache_with_cohort();
        add(&cache, &cohort, "2025-01-10T08:00", "2025-01-10T10:00");
        let paris = served(cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());

        let utc = ExportSettings {
            timezone: chrono_tz::UTC,
            ..ExportSettings::default()
        };
        let other = ExportCache::new(cache.store().clone(), cache.dir(), utc).unwrap();
        assert!(matches!(
            other.entry_state(&Partition::All, ExportFormat::Ics).unwrap(),
            EntryState::Stale(CacheRecord { version: 1, .. })
        ));

        let rendered = served(other.get_export(&Partition::All, ExportFormat::Ics).unwrap());
        assert!(rendered.regenerated);
        assert_eq!(rendered.version, paris.version);
        let ics = String::from_utf8(rendered.bytes).unwrap();
        assert!(ics.contains("DTSTART:20250110T080000Z\r\n"));

        // and back: the first cache no longer trusts the UTC rendering
        let again = served(cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
        assert!(again.regenerated);
        assert_eq!(again.bytes, paris.bytes);
    }

    #[test]
    fn test_stale_temp_files_are_swept() {
        let (dir, store) = temp_store();
        let exports = dir.path().join("exports");
        fs::create_dir_all(&exports).unwrap();
        fs::write(exports.join("all.ics.tmp"), b"partial").unwrap();
        fs::write(exports.join("all.ics.meta.tmp"), b"{").unwrap();

        ExportCache::new(store, &exports, ExportSettings::default()).unwrap();

        assert!(!exports.join("all.ics.tmp").exists());
        assert!(!exports.join("all.ics.meta.tmp").exists());
    }
}
