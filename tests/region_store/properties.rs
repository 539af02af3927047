//! Property tests over random row payloads.

use crate::common::*;
use proptest::prelude::*;

fn scalar_type() -> impl Strategy<Value = ScalarType> {
    prop::sample::select(ScalarType::ALL.to_vec())
}

/// `n` random rows of `ty` sharing one shape of one or two dims.
fn rows_of(ty: ScalarType, n: usize) -> impl Strategy<Value = Vec<Tensor>> {
    prop::collection::vec(1u64..4, 1..3).prop_flat_map(move |shape| {
        let len = shape.iter().product::<u64>() as usize * ty.size_in_bytes();
        prop::collection::vec(prop::collection::vec(any::<u8>(), len), n).prop_map(move |rows| {
            rows.into_iter()
                .map(|bytes| Tensor::from_bytes(ty, shape.clone(), bytes).expect("sized to shape"))
                .collect()
        })
    })
}

fn row_pairs() -> impl Strategy<Value = (Vec<Tensor>, Vec<Tensor>)> {
    (scalar_type(), scalar_type(), 1usize..12)
        .prop_flat_map(|(in_ty, out_ty, n)| (rows_of(in_ty, n), rows_of(out_ty, n)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// N alternating writes leave N rows on each side, and every row reads
    /// back byte for byte after the store is closed.
    #[test]
    fn alternating_rows_read_back_exactly((inputs, outputs) in row_pairs()) {
        let store = TestStore::new();
        {
            let mut db = store.open_with(StoreConfig::default());
            let h = db.instantiate_region(0, "loop", 1).unwrap();
            for (x, y) in inputs.iter().zip(&outputs) {
                db.write_tensor(h, x).unwrap();
                db.write_tensor(h, y).unwrap();
            }
            prop_assert_eq!(db.input_rows(h).unwrap(), inputs.len() as u64);
            prop_assert_eq!(db.output_rows(h).unwrap(), outputs.len() as u64);
            db.close().unwrap();
        }

        let mut reader = store.reader();
        for (side, rows) in [(StreamSide::Input, &inputs), (StreamSide::Output, &outputs)] {
            prop_assert_eq!(reader.scalar_type("loop", side).unwrap(), rows[0].scalar_type());
            prop_assert_eq!(reader.shape("loop", side).unwrap(), rows[0].shape().to_vec());
            for (i, expected) in rows.iter().enumerate() {
                let got = reader.read_row("loop", side, i as u64).unwrap();
                prop_assert_eq!(got.as_bytes(), expected.as_bytes());
            }
        }
    }

    /// A file cut at any point opens and holds a prefix of the rows.
    #[test]
    fn any_truncation_leaves_a_prefix(pairs in 1usize..6, cut_back in 1u64..200) {
        let store = TestStore::new();
        {
            let mut db = store.open();
            let h = db.instantiate_region(0, "loop", 1).unwrap();
            record_pairs(&mut db, h, pairs);
            db.close().unwrap();
        }
        let full = store.file_size();
        let header_len = 32;
        let cut = full.saturating_sub(cut_back).max(header_len);
        truncate_file(&store.path, cut);

        let mut reader = store.reader();
        if let Ok(region) = reader.region("loop") {
            let region = region.as_tensor().unwrap();
            let inputs = region.input().rows();
            let outputs = region.output().rows();
            prop_assert!(inputs == outputs || inputs == outputs + 1);
            prop_assert!(inputs <= pairs as u64);
            for i in 0..inputs {
                let x = reader.read_row("loop", StreamSide::Input, i).unwrap();
                prop_assert_eq!(x.to_vec::<f64>().unwrap(), vec![i as f64, i as f64 + 1.0]);
            }
        }
    }
}

#[test]
fn every_scalar_type_is_stored_natively() {
    let store = TestStore::new();
    let mut db = store.open();
    for ty in ScalarType::ALL {
        let h = db.instantiate_region(0, &format!("t{}", ty.id()), 1).unwrap();
        let bytes: Vec<u8> = (0..3 * ty.size_in_bytes()).map(|b| b as u8).collect();
        let x = Tensor::from_bytes(ty, vec![3], bytes).unwrap();
        db.write_tensor(h, &x).unwrap();
        db.write_tensor(h, &x).unwrap();
    }
    db.close().unwrap();

    let mut reader = store.reader();
    for ty in ScalarType::ALL {
        let group = format!("t{}", ty.id());
        assert_eq!(reader.type_attribute(&group, "input").unwrap(), ty.id());
        let row = reader.read_row(&group, StreamSide::Output, 0).unwrap();
        assert_eq!(row.scalar_type(), ty);
        assert_eq!(row.as_bytes().len(), 3 * ty.size_in_bytes());
    }
}
