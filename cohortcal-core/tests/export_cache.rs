use std::fs;
use std::sync::Barrier;
use std::thread;

use cohortcal_core::{
    CachedExport, Cohort, EntryState, EventQuery, EventStore, ExportCache, ExportError,
    ExportFormat, ExportOutcome, ExportSettings, NewEvent, Partition, PartitionRegistry,
    StoreError, VersionKey,
};
use cohortcal_core::time::parse_wall_clock;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    store: EventStore,
    cache: ExportCache,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::open(dir.path().join("cohortcal.db")).unwrap();
    let cache = ExportCache::new(
        store.clone(),
        dir.path().join("exports"),
        ExportSettings::default(),
    )
    .unwrap();
    Fixture {
        _dir: dir,
        store,
        cache,
    }
}

fn lecture(cohort: &Cohort, start: &str, subject: &str) -> NewEvent {
    let start = parse_wall_clock(start).unwrap();
    NewEvent::new(cohort.id, start, start + chrono::Duration::hours(2), subject)
        .with_category("CM")
}

fn served(outcome: ExportOutcome) -> CachedExport {
    match outcome {
        ExportOutcome::Served(export) => export,
        ExportOutcome::NoContent => panic!("expected a document, got no content"),
    }
}

#[test]
fn scenario_insert_duplicate_delete() {
    let f = fixture();
    let x = f.store.insert_cohort("X").unwrap();
    let partition = Partition::Cohort(x.clone());

    let a = f
        .store
        .insert_event(&lecture(&x, "2025-01-10T08:00", "Maths"))
        .unwrap();
    assert_eq!(f.store.current_version().unwrap(), 1);

    let first = served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap());
    assert!(first.regenerated);
    assert_eq!(first.version, 1);
    let ics = String::from_utf8(first.bytes.clone()).unwrap();
    assert!(ics.contains(&format!("UID:{}\r\n", a.uid())));

    let err = f
        .store
        .insert_event(&lecture(&x, "2025-01-10T08:00", "Physics"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));
    assert!(!err.is_storage());
    assert_eq!(f.store.current_version().unwrap(), 1);

    let second = served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap());
    assert!(!second.regenerated);
    assert_eq!(second.version, 1);
    assert_eq!(second.bytes, first.bytes);

    f.store.delete_event(a.id).unwrap();
    assert_eq!(f.store.current_version().unwrap(), 2);

    let outcome = f.cache.get_export(&partition, ExportFormat::Ics).unwrap();
    assert!(matches!(outcome, ExportOutcome::NoContent));
    assert_eq!(
        f.cache.entry_state(&partition, ExportFormat::Ics).unwrap(),
        EntryState::Absent
    );
}

#[test]
fn uniqueness_holds_per_cohort_across_many_inserts() {
    let f = fixture();
    let a = f.store.insert_cohort("A").unwrap();
    let b = f.store.insert_cohort("B").unwrap();

    let starts = [
        "2025-01-10T08:00",
        "2025-01-10T10:00",
        "2025-01-10 08:00:00",
        "2025-01-10T08:00:00",
        "2025-01-10T14:00",
    ];
    for cohort in [&a, &b] {
        for start in starts {
            let _ = f.store.insert_event(&lecture(cohort, start, "Maths"));
        }
    }

    let events = f.store.query_events(&EventQuery::all()).unwrap();
    assert_eq!(events.len(), 6);
    for (i, left) in events.iter().enumerate() {
        for right in &events[i + 1..] {
            if left.cohort_id == right.cohort_id {
                assert_ne!(left.start, right.start);
            }
        }
    }
}

#[test]
fn version_increases_by_one_per_committed_mutation() {
    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();

    let mut expected = f.store.current_version().unwrap();
    assert_eq!(expected, 0);

    let mut ids = Vec::new();
    for day in 10..15 {
        let event = f
            .store
            .insert_event(&lecture(&cohort, &format!("2025-01-{}T08:00", day), "Maths"))
            .unwrap();
        ids.push(event.id);
        expected += 1;
        assert_eq!(f.store.current_version().unwrap(), expected);

        // rejected mutations never move the counter
        assert!(
            f.store
                .insert_event(&lecture(&cohort, &format!("2025-01-{}T08:00", day), "Maths"))
                .is_err()
        );
        assert_eq!(f.store.current_version().unwrap(), expected);
    }

    for id in ids {
        f.store.delete_event(id).unwrap();
        expected += 1;
        assert_eq!(f.store.current_version().unwrap(), expected);
        assert!(f.store.delete_event(id).is_err());
        assert_eq!(f.store.current_version().unwrap(), expected);
    }

    assert_eq!(
        f.store.version(&VersionKey::Cohort(cohort.id)).unwrap(),
        expected
    );
}

#[test]
fn empty_membership_yields_nothing() {
    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    f.store
        .insert_event(&lecture(&cohort, "2025-01-10T08:00", "Maths"))
        .unwrap();

    assert_eq!(f.store.query_events(&EventQuery::all()).unwrap().len(), 1);
    assert!(
        f.store
            .query_events(&EventQuery::all().with_subjects(Vec::<String>::new()))
            .unwrap()
            .is_empty()
    );
    assert!(
        f.store
            .query_events(&EventQuery::all().owned_by(Vec::new()))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn unchanged_partition_is_served_byte_identical() {
    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    f.store
        .insert_event(&lecture(&cohort, "2025-01-10T08:00", "Maths"))
        .unwrap();

    for format in ExportFormat::ALL {
        let first = served(f.cache.get_export(&Partition::All, format).unwrap());
        for _ in 0..3 {
            let again = served(f.cache.get_export(&Partition::All, format).unwrap());
            assert!(!again.regenerated);
            assert_eq!(again.bytes, first.bytes);
            assert_eq!(again.generated_at, first.generated_at);
        }
    }
}

#[test]
fn mutation_is_reflected_on_next_request() {
    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    let partition = Partition::Cohort(cohort.clone());

    f.store
        .insert_event(&lecture(&cohort, "2025-01-10T08:00", "Maths"))
        .unwrap();
    served(f.cache.get_export(&partition, ExportFormat::Csv).unwrap());

    f.store
        .insert_event(&lecture(&cohort, "2025-01-11T08:00", "Physics"))
        .unwrap();
    let export = served(f.cache.get_export(&partition, ExportFormat::Csv).unwrap());

    assert!(export.regenerated);
    assert_eq!(export.version, 2);
    let csv = String::from_utf8(export.bytes).unwrap();
    assert!(csv.contains("Maths"));
    assert!(csv.contains("Physics"));
}

#[test]
fn other_cohort_mutations_keep_partition_fresh() {
    let f = fixture();
    let a = f.store.insert_cohort("A").unwrap();
    let b = f.store.insert_cohort("B").unwrap();
    let partition = Partition::Cohort(a.clone());

    f.store
        .insert_event(&lecture(&a, "2025-01-10T08:00", "Maths"))
        .unwrap();
    served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap());

    f.store
        .insert_event(&lecture(&b, "2025-01-10T08:00", "Maths"))
        .unwrap();

    let again = served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap());
    assert!(!again.regenerated);

    // the whole-dataset partition does see the change
    let all = served(f.cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
    assert_eq!(all.version, 2);
}

#[test]
fn concurrent_requests_regenerate_at_most_once() {
    const READERS: usize = 8;

    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    for day in 10..20 {
        f.store
            .insert_event(&lecture(&cohort, &format!("2025-01-{}T08:00", day), "Maths"))
            .unwrap();
    }
    let partition = Partition::Cohort(cohort);
    let barrier = Barrier::new(READERS);

    let exports: Vec<CachedExport> = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let regenerations = exports.iter().filter(|e| e.regenerated).count();
    assert_eq!(regenerations, 1);
    assert!(exports.iter().all(|e| e.bytes == exports[0].bytes));
    assert!(exports.iter().all(|e| e.version == 10));
}

#[test]
fn concurrent_inserts_at_same_start_admit_one() {
    const WRITERS: usize = 6;

    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    let barrier = Barrier::new(WRITERS);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    f.store
                        .insert_event(&lecture(&cohort, "2025-01-10T08:00", "Maths"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::Duplicate { .. }))
    );
    assert_eq!(f.store.current_version().unwrap(), 1);
}

#[test]
fn failed_publish_leaves_entry_untouched_and_retries() {
    let f = fixture();
    let cohort = f.store.insert_cohort("A").unwrap();
    f.store
        .insert_event(&lecture(&cohort, "2025-01-10T08:00", "Maths"))
        .unwrap();

    // occupy the publish target with a directory so the rename fails
    let target = f.cache.dir().join("all.ics");
    fs::create_dir(&target).unwrap();

    let err = f
        .cache
        .get_export(&Partition::All, ExportFormat::Ics)
        .unwrap_err();
    assert!(matches!(err, ExportError::Publish { .. }));
    assert_eq!(
        f.cache
            .entry_state(&Partition::All, ExportFormat::Ics)
            .unwrap(),
        EntryState::Absent
    );

    fs::remove_dir(&target).unwrap();
    let export = served(f.cache.get_export(&Partition::All, ExportFormat::Ics).unwrap());
    assert!(export.regenerated);
    assert_eq!(export.version, 1);
}

#[test]
fn start_instants_stay_distinct_across_dst_changes() {
    let f = fixture();
    let x = f.store.insert_cohort("X").unwrap();

    // skipped hour in Paris: 02:30 would export at the same instant as 03:30
    let err = f
        .store
        .insert_event(&lecture(&x, "2025-03-30T02:30", "Maths"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));

    for start in [
        "2025-03-30T01:00",
        "2025-03-30T03:30",
        "2025-10-26T01:30",
        "2025-10-26T02:30",
        "2025-10-26T03:30",
    ] {
        f.store.insert_event(&lecture(&x, start, "Maths")).unwrap();
    }

    let partition = Partition::Cohort(x);
    let ics = served(f.cache.get_export(&partition, ExportFormat::Ics).unwrap());
    let ics = String::from_utf8(ics.bytes).unwrap();
    let mut starts: Vec<_> = ics
        .lines()
        .filter_map(|line| line.strip_prefix("DTSTART:"))
        .collect();
    starts.sort();
    assert_eq!(
        starts,
        [
            "20250330T000000Z",
            "20250330T013000Z",
            "20251025T233000Z",
            "20251026T003000Z",
            "20251026T023000Z",
        ]
    );

    let csv = served(f.cache.get_export(&partition, ExportFormat::Csv).unwrap());
    assert_eq!(String::from_utf8(csv.bytes).unwrap().lines().count(), 6);
}

#[test]
fn registry_provisions_every_cohort() {
    let f = fixture();
    let a = f.store.insert_cohort("M1 E3A").unwrap();
    f.store.insert_cohort("PSEE").unwrap();
    f.store
        .insert_event(&lecture(&a, "2025-01-10T08:00", "Maths"))
        .unwrap();

    let registry = PartitionRegistry::new(f.store.clone());
    let partitions = registry.partitions().unwrap();
    assert_eq!(partitions[0].partition, Partition::All);

    let mut served_count = 0;
    let mut empty_count = 0;
    for registered in &partitions {
        match f
            .cache
            .get_export(&registered.partition, ExportFormat::Ics)
            .unwrap()
        {
            ExportOutcome::Served(_) => served_count += 1,
            ExportOutcome::NoContent => empty_count += 1,
        }
    }
    assert_eq!((served_count, empty_count), (2, 1));
}
