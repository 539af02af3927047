//! Multi-threaded recording through SharedDatabase.

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn threads_recording_their_own_regions() {
    let store = TestStore::new();
    let db = SharedDatabase::open_with_config(&store.path, always_config()).unwrap();
    let threads = 4;
    let pairs = 25;
    let barrier = Arc::new(Barrier::new(threads));

    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let h = db
                    .instantiate_region(t as u64, &format!("worker{}", t), 8)
                    .unwrap();
                barrier.wait();
                for i in 0..pairs {
                    db.write_tensor(h, &Tensor::vector(&[t as i64, i as i64])).unwrap();
                    db.write_tensor(h, &Tensor::vector(&[i as f32])).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    db.close().unwrap();

    let mut reader = store.reader();
    assert_eq!(reader.regions().len(), threads);
    for t in 0..threads {
        let group = format!("worker{}", t);
        assert_eq!(reader.rows(&group, StreamSide::Input).unwrap(), pairs as u64);
        assert_eq!(reader.rows(&group, StreamSide::Output).unwrap(), pairs as u64);
        let last = reader
            .read_row(&group, StreamSide::Input, pairs as u64 - 1)
            .unwrap();
        assert_eq!(last.to_vec::<i64>().unwrap(), vec![t as i64, pairs as i64 - 1]);
    }
}

#[test]
fn shared_region_keeps_strict_alternation() {
    let store = TestStore::new();
    let db = SharedDatabase::open(&store.path).unwrap();
    let h = db.instantiate_region(0, "shared", 1).unwrap();

    // Each thread writes a whole pair under one lock so pairs never interleave.
    let workers: Vec<_> = (0..3)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    db.with(|d| {
                        d.write_input(h, &Tensor::vector(&[t as f64])).unwrap();
                        d.write_output(h, &Tensor::vector(&[i as f64])).unwrap();
                    });
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    db.with(|d| {
        assert_eq!(d.input_rows(h).unwrap(), 30);
        assert_eq!(d.output_rows(h).unwrap(), 30);
        assert_eq!(d.region_state(h).unwrap(), RegionState::AwaitingInput);
    });
}

#[test]
fn reader_opens_while_writer_is_live() {
    let store = TestStore::new();
    let db = SharedDatabase::open_with_config(&store.path, always_config()).unwrap();
    let h = db.instantiate_region(0, "live", 1).unwrap();
    db.write_tensor(h, &Tensor::vector(&[1u8, 2])).unwrap();

    let reader = store.reader();
    assert_eq!(reader.rows("live", StreamSide::Input).unwrap(), 1);
    assert_eq!(reader.rows("live", StreamSide::Output).unwrap(), 0);
}
