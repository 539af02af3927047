//! Input/output alternation as seen from the Database.

use crate::common::*;

#[test]
fn first_write_is_input_second_is_output() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0x4005d0, "loop", 64).unwrap();

    assert_eq!(db.region_state(h).unwrap(), RegionState::AwaitingInput);
    db.write_tensor(h, &Tensor::vector(&[1.0f64, 2.0])).unwrap();
    assert_eq!(db.region_state(h).unwrap(), RegionState::AwaitingOutput);
    db.write_tensor(h, &Tensor::vector(&[3.0f64])).unwrap();
    assert_eq!(db.region_state(h).unwrap(), RegionState::AwaitingInput);

    assert_eq!(db.input_rows(h).unwrap(), 1);
    assert_eq!(db.output_rows(h).unwrap(), 1);
}

#[test]
fn explicit_side_out_of_turn_is_rejected() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0, "loop", 1).unwrap();

    let err = db.write_output(h, &Tensor::vector(&[1.0f64])).unwrap_err();
    assert!(matches!(
        err,
        StoreError::AlternationViolation {
            expected: StreamSide::Input,
            attempted: StreamSide::Output,
            ..
        }
    ));

    db.write_input(h, &Tensor::vector(&[1.0f64])).unwrap();
    assert!(matches!(
        db.write_input(h, &Tensor::vector(&[2.0f64])),
        Err(StoreError::AlternationViolation { .. })
    ));
    assert_eq!(db.input_rows(h).unwrap(), 1);
    assert_eq!(db.output_rows(h).unwrap(), 0);
}

#[test]
fn regions_alternate_independently() {
    let store = TestStore::new();
    let mut db = store.open();
    let a = db.instantiate_region(0x10, "a", 1).unwrap();
    let b = db.instantiate_region(0x20, "b", 1).unwrap();

    db.write_tensor(a, &Tensor::vector(&[1i32])).unwrap();
    db.write_tensor(b, &Tensor::vector(&[2i32])).unwrap();
    db.write_tensor(b, &Tensor::vector(&[3i32])).unwrap();

    assert_eq!(db.region_state(a).unwrap(), RegionState::AwaitingOutput);
    assert_eq!(db.region_state(b).unwrap(), RegionState::AwaitingInput);
}

#[test]
fn shape_change_is_rejected_and_turn_is_kept() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0, "loop", 1).unwrap();
    record_pairs(&mut db, h, 2);

    let wrong_shape = Tensor::vector(&[1.0f64, 2.0, 3.0]);
    assert!(matches!(
        db.write_tensor(h, &wrong_shape),
        Err(StoreError::ShapeMismatch { .. })
    ));
    let wrong_type = Tensor::vector(&[1.0f32, 2.0]);
    assert!(matches!(
        db.write_tensor(h, &wrong_type),
        Err(StoreError::ShapeMismatch { .. })
    ));

    assert_eq!(db.region_state(h).unwrap(), RegionState::AwaitingInput);
    db.write_tensor(h, &Tensor::vector(&[9.0f64, 9.0])).unwrap();
    assert_eq!(db.input_rows(h).unwrap(), 3);
}

#[test]
fn row_rank_beyond_file_format_is_rejected_and_file_stays_readable() {
    let store = TestStore::new();
    {
        let mut db = store.open();
        let h = db.instantiate_region(0, "loop", 1).unwrap();
        let too_wide = Tensor::from_slice(&[1.0f64], &vec![1; 255]).unwrap();
        assert!(matches!(
            db.write_tensor(h, &too_wide),
            Err(StoreError::ShapeMismatch { .. })
        ));
        assert_eq!(db.region_state(h).unwrap(), RegionState::AwaitingInput);

        let widest = Tensor::from_slice(&[1.0f64], &vec![1; 254]).unwrap();
        db.write_tensor(h, &widest).unwrap();
        db.write_tensor(h, &Tensor::vector(&[2.0f64])).unwrap();
        db.close().unwrap();
    }

    let mut reader = store.reader();
    assert_eq!(reader.rows("loop", StreamSide::Input).unwrap(), 1);
    assert_eq!(reader.shape("loop", StreamSide::Input).unwrap(), vec![1; 254]);
    assert_eq!(
        reader.read_row("loop", StreamSide::Output, 0).unwrap().to_vec::<f64>().unwrap(),
        vec![2.0]
    );
    drop(reader);
    store.open().close().unwrap();
}

#[test]
fn handles_are_checked() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0, "loop", 1).unwrap();
    let bogus = RegionHandle::new(h.index() as u32 + 5);

    assert!(matches!(
        db.write_tensor(bogus, &Tensor::vector(&[1u8])),
        Err(StoreError::InvalidHandle { len: 1, .. })
    ));
    assert!(matches!(
        db.region_info(bogus),
        Err(StoreError::InvalidHandle { .. })
    ));
}

#[test]
fn read_back_during_recording() {
    let store = TestStore::new();
    let mut db = store.open();
    let h = db.instantiate_region(0, "loop", 1).unwrap();
    record_pairs(&mut db, h, 4);

    let x = db.read_row(h, StreamSide::Input, 3).unwrap();
    assert_eq!(x.shape(), &[2]);
    assert_eq!(x.to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
    let y = db.read_row(h, StreamSide::Output, 2).unwrap();
    assert_eq!(y.to_vec::<f64>().unwrap(), vec![4.0]);

    assert!(matches!(
        db.read_row(h, StreamSide::Output, 4),
        Err(StoreError::RowOutOfRange { row: 4, rows: 4, .. })
    ));
}
