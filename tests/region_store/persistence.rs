//! Close, reopen and crash recovery.

use crate::common::*;

#[test]
fn reader_sees_everything_written() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0x4005d0, "loop", 32).unwrap();
        record_pairs(&mut db, h, 5);
        db.close().unwrap();
    }

    let mut reader = store.reader();
    let region = reader.region("loop").unwrap();
    assert_eq!(region.kind(), RegionKind::Tensor);
    assert_eq!(region.address(), 0x4005d0);
    assert_eq!(reader.rows("loop", StreamSide::Input).unwrap(), 5);
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 5);
    assert_eq!(reader.scalar_type("loop", StreamSide::Input).unwrap(), ScalarType::Float64);
    assert_eq!(reader.type_attribute("loop", "output").unwrap(), ScalarType::Float64.id());
    assert_eq!(
        reader.read_row("loop", StreamSide::Input, 4).unwrap().to_vec::<f64>().unwrap(),
        vec![4.0, 5.0]
    );
}

#[test]
fn drop_without_close_keeps_commits() {
    let store = TestStore::new();
    {
        let mut db = store.open_with(StoreConfig::default());
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        record_pairs(&mut db, h, 3);
    }
    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 3);
}

#[test]
fn torn_tail_loses_only_the_last_row() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        record_pairs(&mut db, h, 3);
        db.close().unwrap();
    }
    let full = store.file_size();
    truncate_file(&store.path, full - 3);

    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Input).unwrap(), 3);
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 2);
    let region = reader.region("loop").unwrap().as_tensor().unwrap();
    assert_eq!(region.state(), RegionState::AwaitingOutput);
    drop(reader);

    // A read-only open leaves the torn bytes in place.
    assert_eq!(store.file_size(), full - 3);
}

#[test]
fn corrupt_tail_is_truncated_by_writer() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        record_pairs(&mut db, h, 2);
        db.close().unwrap();
    }
    let full = store.file_size();
    corrupt_file_at_offset(&store.path, full - 6, &[0xFF, 0x00, 0xFF]);

    {
        let db = store.open();
        assert!(store.file_size() < full);
        db.close().unwrap();
    }
    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Input).unwrap(), 2);
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 1);
}

#[test]
fn trailing_garbage_is_ignored() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        record_pairs(&mut db, h, 2);
        db.close().unwrap();
    }
    append_garbage(&store.path, &[0xAB; 7]);

    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 2);
}

#[test]
fn append_mode_keeps_old_groups_and_suffixes_new_ones() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0x1, "loop", 1).unwrap();
        record_pairs(&mut db, h, 2);
        db.close().unwrap();
    }
    {
        let mut db = store.open();
        let h = db.instantiate_region(0x1, "loop", 1).unwrap();
        assert_eq!(h.index(), 0);
        assert_eq!(db.region_info(h).unwrap().group, "loop.1");
        record_pairs(&mut db, h, 1);
        db.close().unwrap();
    }

    let reader = store.reader();
    let groups: Vec<_> = reader.group_names().collect();
    assert_eq!(groups, vec!["loop", "loop.1"]);
    assert_eq!(reader.rows("loop", StreamSide::Input).unwrap(), 2);
    assert_eq!(reader.rows("loop.1", StreamSide::Input).unwrap(), 1);
    assert_eq!(reader.region("loop.1").unwrap().name(), "loop");
}

#[test]
fn truncate_mode_starts_over() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0, "old", 1).unwrap();
        record_pairs(&mut db, h, 2);
        db.close().unwrap();
    }
    {
        let mut db = store.open_with(truncate_config());
        db.instantiate_region(0, "new", 1).unwrap();
        db.close().unwrap();
    }

    let reader = store.reader();
    let groups: Vec<_> = reader.group_names().collect();
    assert_eq!(groups, vec!["new"]);
}

#[test]
fn second_writer_is_refused_but_reader_is_not() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0, "loop", 1).unwrap();
    record_pairs(&mut db, h, 1);

    assert!(matches!(
        Database::open_with_config(&store.path, always_config()),
        Err(StoreError::StorageOpen { .. })
    ));
    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 1);
}

#[test]
fn non_store_file_is_refused() {
    let store = TestStore::new();
    std::fs::write(&store.path, b"definitely not a store file, just text").unwrap();
    assert!(matches!(
        Database::open_with_config(&store.path, always_config()),
        Err(StoreError::StorageOpen { .. })
    ));
    assert!(matches!(
        StoreReader::open(&store.path),
        Err(StoreError::StorageOpen { .. })
    ));
}

#[test]
fn headerless_file_is_recreated_in_append_mode() {
    let store = TestStore::new();
    std::fs::write(&store.path, [0x41, 0x50, 0x58]).unwrap();
    {
        let mut db = store.open();
        assert_eq!(db.region_count(), 0);
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        record_pairs(&mut db, h, 1);
        db.close().unwrap();
    }
    let reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Output).unwrap(), 1);
}

#[test]
fn file_identity_survives_reopen() {
    let store = TestStore::new();
    store.open().close().unwrap();
    let first = store.reader().file_uuid();
    store.open().close().unwrap();
    assert_eq!(store.reader().file_uuid(), first);
}
