//! Tabular regions: fixed-width feature rows.

use crate::common::*;

fn layout() -> (Vec<VarInfo>, Vec<VarInfo>) {
    (
        vec![
            VarInfo::new(ScalarType::Float64, 2),
            VarInfo::new(ScalarType::Int32, 1),
        ],
        vec![VarInfo::new(ScalarType::Float32, 1)],
    )
}

#[test]
fn batched_rows_round_trip_through_reader() {
    let store = TestStore::new();
    let (inputs, outputs) = layout();
    {
        let mut db = store.open();
        let h = db
            .instantiate_tabular_region(0x700, "features", &inputs, &outputs, 128)
            .unwrap();
        assert_eq!(db.region_info(h).unwrap().kind, RegionKind::Tabular);

        let first = db
            .write(h, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 2, 4)
            .unwrap();
        assert_eq!(first, 0);
        let next = db.write(h, &[9.0, 10.0, 11.0, 12.0], 1, 4).unwrap();
        assert_eq!(next, 2);
        assert_eq!(db.tabular_rows(h).unwrap(), 3);
        db.close().unwrap();
    }

    let mut reader = store.reader();
    assert_eq!(reader.tabular_rows("features").unwrap(), 3);
    assert_eq!(
        reader.read_tabular_row("features", 1).unwrap(),
        vec![5.0, 6.0, 7.0, 8.0]
    );
    assert_eq!(reader.type_attribute("features", "data").unwrap(), ScalarType::Float64.id());

    let view = reader.region("features").unwrap().as_tabular().unwrap();
    assert_eq!(view.inputs(), &inputs[..]);
    assert_eq!(view.outputs(), &outputs[..]);
    assert_eq!(view.num_cols(), 4);
    assert_eq!(reader.chunk_rows_hint("features").unwrap(), 128);
}

#[test]
fn column_and_buffer_mismatches_are_rejected() {
    let store = TestStore::new();
    let (inputs, outputs) = layout();
    let mut db = store.open();
    let h = db
        .instantiate_tabular_region(0, "features", &inputs, &outputs, 1)
        .unwrap();

    assert!(matches!(
        db.write(h, &[1.0, 2.0, 3.0], 1, 3),
        Err(StoreError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        db.write(h, &[1.0, 2.0, 3.0], 1, 4),
        Err(StoreError::ShapeMismatch { .. })
    ));
    assert_eq!(db.tabular_rows(h).unwrap(), 0);
}

#[test]
fn oversized_batch_is_refused_without_a_commit() {
    let store = TestStore::new();
    let (inputs, outputs) = layout();
    let mut db = store.open();
    let h = db
        .instantiate_tabular_region(0, "features", &inputs, &outputs, 1)
        .unwrap();
    db.write(h, &[1.0; 4], 1, 4).unwrap();
    let commits = db.counters().commits;

    assert!(matches!(
        db.write(h, &[], approx_store::MAX_WRITE_BYTES, 4),
        Err(StoreError::StorageWrite(_))
    ));
    assert_eq!(db.tabular_rows(h).unwrap(), 1);
    assert_eq!(db.counters().commits, commits);
    db.close().unwrap();

    let reader = store.reader();
    assert_eq!(reader.tabular_rows("features").unwrap(), 1);
}

#[test]
fn zero_rows_is_a_no_op() {
    let store = TestStore::new();
    let (inputs, outputs) = layout();
    let mut db = store.open();
    let h = db
        .instantiate_tabular_region(0, "features", &inputs, &outputs, 1)
        .unwrap();
    let commits = db.counters().commits;

    assert_eq!(db.write(h, &[], 0, 4).unwrap(), 0);
    assert_eq!(db.tabular_rows(h).unwrap(), 0);
    assert_eq!(db.counters().commits, commits);
}

#[test]
fn tensor_and_tabular_calls_do_not_mix() {
    let store = TestStore::new();
    let (inputs, outputs) = layout();
    let mut db = store.open();
    let tensor = db.instantiate_region(0, "loop", 1).unwrap();
    let tab = db
        .instantiate_tabular_region(0, "features", &inputs, &outputs, 1)
        .unwrap();

    assert!(matches!(
        db.write(tensor, &[1.0; 4], 1, 4),
        Err(StoreError::RegionKindMismatch {
            expected: RegionKind::Tabular,
            actual: RegionKind::Tensor,
            ..
        })
    ));
    assert!(matches!(
        db.write_tensor(tab, &Tensor::vector(&[1.0f64])),
        Err(StoreError::RegionKindMismatch { .. })
    ));
}

#[test]
fn empty_layout_is_rejected() {
    let store = TestStore::new();
    let mut db = store.open();
    assert!(matches!(
        db.instantiate_tabular_region(0, "features", &[], &[], 1),
        Err(StoreError::ShapeMismatch { .. })
    ));
    assert_eq!(db.region_count(), 0);
}
