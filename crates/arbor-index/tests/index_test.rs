//! Index behavior through the public API.
//!
//! Covers:
//! - Integer keys of every width, arity 1 to 4, on both container kinds
//! - Multiple locations per key and deletes of absent pairs
//! - Uniqueness enforcement
//! - Key order across signed values and NULLs
//! - Bw-tree against the locked B-tree under a random operation sequence

use arbor_common::{ArborError, IndexConfig, TypeId, Value};
use arbor_index::{
    Column, Index, IndexFactory, IndexKind, IndexMetadata, ItemPointer, KeyEncoder, Schema,
};
use rand::Rng;
use std::collections::BTreeMap;

const NUM_TUPLES: i64 = 10;

const INT_TYPES: [TypeId; 4] = [TypeId::Int64, TypeId::Int32, TypeId::Int16, TypeId::Int8];

// =============================================================================
// Helpers
// =============================================================================

/// Builds an index whose key is the whole tuple, one column per type.
fn build_index(kind: IndexKind, unique: bool, col_types: &[TypeId], config: &IndexConfig) -> Index {
    let columns: Vec<Column> = col_types
        .iter()
        .enumerate()
        .map(|(i, &t)| Column::new(t, ((b'A' + i as u8) as char).to_string(), true))
        .collect();
    let key_attrs: Vec<usize> = (0..columns.len()).collect();
    let key_schema = Schema::new(columns.clone()).with_indexed_columns(key_attrs.clone());
    let metadata = IndexMetadata::new(
        "MAGIC_TEST_INDEX",
        125,
        Schema::new(columns),
        key_schema,
        key_attrs,
        unique,
        kind,
    )
    .unwrap();
    IndexFactory::create(metadata, config).unwrap()
}

fn int_key(col_types: &[TypeId], i: i64) -> Vec<Value> {
    col_types
        .iter()
        .enumerate()
        .map(|(col, &t)| Value::integer(t, 10 * i + col as i64).unwrap())
        .collect()
}

fn ints_key_round(kind: IndexKind, col_types: &[TypeId]) {
    let index = build_index(kind, false, col_types, &IndexConfig::default());

    let keys: Vec<Vec<Value>> = (0..NUM_TUPLES).map(|i| int_key(col_types, i)).collect();
    let items: Vec<ItemPointer> = (0..NUM_TUPLES)
        .map(|i| ItemPointer::new(i as u32, (i * i) as u32))
        .collect();

    for (key, item) in keys.iter().zip(&items) {
        index.insert_entry(key, *item).unwrap();
    }

    for (key, item) in keys.iter().zip(&items) {
        let found = index.scan_key(key).unwrap();
        assert_eq!(found.len(), 1, "{:?} {:?}", col_types, key);
        assert_eq!(found[0].block, item.block);
        assert_eq!(found[0], *item);
    }

    for (key, item) in keys.iter().zip(&items) {
        assert!(index.delete_entry(key, *item).unwrap());
        assert!(index.scan_key(key).unwrap().is_empty());
    }
    assert_eq!(index.key_count(), 0);
}

fn all_type_combinations(arity: usize) -> Vec<Vec<TypeId>> {
    let mut combos: Vec<Vec<TypeId>> = vec![vec![]];
    for _ in 0..arity {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                INT_TYPES.iter().map(move |&t| {
                    let mut next = prefix.clone();
                    next.push(t);
                    next
                })
            })
            .collect();
    }
    combos
}

// =============================================================================
// Integer keys
// =============================================================================

#[test]
fn test_ints_key_bwtree() {
    let mut rounds = 0;
    for arity in 1..=4 {
        for col_types in all_type_combinations(arity) {
            ints_key_round(IndexKind::BwTree, &col_types);
            rounds += 1;
        }
    }
    assert_eq!(rounds, 4 + 16 + 64 + 256);
}

#[test]
fn test_ints_key_btree() {
    for arity in 1..=2 {
        for col_types in all_type_combinations(arity) {
            ints_key_round(IndexKind::BTree, &col_types);
        }
    }
}

// =============================================================================
// Entry semantics
// =============================================================================

#[test]
fn test_multiple_locations_per_key() {
    let index = build_index(IndexKind::BwTree, false, &[TypeId::Int32], &IndexConfig::default());
    let key = vec![Value::Int32(42)];
    let locations: Vec<ItemPointer> = (0..20).map(|i| ItemPointer::new(i, i * 3)).collect();

    for l in &locations {
        index.insert_entry(&key, *l).unwrap();
    }
    let mut found = index.scan_key(&key).unwrap();
    found.sort();
    assert_eq!(found, locations);

    for l in locations.iter().step_by(2) {
        assert!(index.delete_entry(&key, *l).unwrap());
    }
    let mut found = index.scan_key(&key).unwrap();
    found.sort();
    let expected: Vec<ItemPointer> = locations.iter().skip(1).step_by(2).copied().collect();
    assert_eq!(found, expected);
}

#[test]
fn test_delete_absent_pair_is_noop() {
    let index = build_index(IndexKind::BwTree, false, &[TypeId::Int16], &IndexConfig::default());
    let a = vec![Value::Int16(1)];
    let b = vec![Value::Int16(2)];
    let l = ItemPointer::new(1, 1);
    index.insert_entry(&a, l).unwrap();

    assert!(!index.delete_entry(&a, ItemPointer::new(9, 9)).unwrap());
    assert!(!index.delete_entry(&b, l).unwrap());
    assert_eq!(index.scan_key(&a).unwrap(), vec![l]);
    assert!(index.scan_key(&b).unwrap().is_empty());
}

#[test]
fn test_unique_index() {
    for kind in [IndexKind::BwTree, IndexKind::BTree] {
        let index = build_index(kind, true, &[TypeId::Int64, TypeId::Int8], &IndexConfig::default());
        let key = vec![Value::Int64(-7), Value::Int8(3)];
        let first = ItemPointer::new(1, 1);

        index.insert_entry(&key, first).unwrap();
        let err = index.insert_entry(&key, ItemPointer::new(2, 2)).unwrap_err();
        assert!(matches!(err, ArborError::UniqueConstraintViolation { .. }));
        assert_eq!(index.scan_key(&key).unwrap(), vec![first]);

        // Freed key can be taken by another location.
        assert!(index.delete_entry(&key, first).unwrap());
        index.insert_entry(&key, ItemPointer::new(2, 2)).unwrap();
        assert_eq!(index.scan_key(&key).unwrap(), vec![ItemPointer::new(2, 2)]);
    }
}

#[test]
fn test_scan_all_keys_in_value_order() {
    let config = IndexConfig {
        delta_chain_threshold: 2,
        leaf_max_entries: 4,
        inner_max_entries: 4,
        ..IndexConfig::default()
    };
    let index = build_index(IndexKind::BwTree, false, &[TypeId::Int32, TypeId::Int8], &config);

    let mut rng = rand::rng();
    let mut expected: BTreeMap<(Option<i32>, i8), ItemPointer> = BTreeMap::new();
    for i in 0..400u32 {
        let a = if i % 37 == 0 {
            None
        } else {
            Some(rng.random_range(-1000..1000))
        };
        let b: i8 = rng.random_range(-100..100);
        let key = vec![a.map(Value::Int32).unwrap_or(Value::Null), Value::Int8(b)];
        let l = ItemPointer::new(i, 0);
        if expected.contains_key(&(a, b)) {
            continue;
        }
        index.insert_entry(&key, l).unwrap();
        expected.insert((a, b), l);
    }

    let all = index.scan_all_keys().unwrap();
    assert_eq!(all.len(), expected.len());
    for ((values, locations), ((a, b), l)) in all.iter().zip(&expected) {
        let want_a = a.map(Value::Int32).unwrap_or(Value::Null);
        assert_eq!(values, &vec![want_a, Value::Int8(*b)]);
        assert_eq!(locations, &vec![*l]);
    }
}

#[test]
fn test_encoded_order_matches_value_order() {
    let schema = Schema::new(vec![
        Column::new(TypeId::Int16, "a", false),
        Column::new(TypeId::Int64, "b", false),
    ]);
    let mut rng = rand::rng();
    for _ in 0..2000 {
        let x: (i16, i64) = (rng.random(), rng.random());
        let y: (i16, i64) = (rng.random(), rng.random());
        let ex = KeyEncoder::encode(&[Value::Int16(x.0), Value::Int64(x.1)], &schema).unwrap();
        let ey = KeyEncoder::encode(&[Value::Int16(y.0), Value::Int64(y.1)], &schema).unwrap();
        assert_eq!(ex.cmp(&ey), x.cmp(&y), "{:?} vs {:?}", x, y);
    }
}

#[test]
fn test_malformed_metadata_rejected() {
    let tuple = Schema::new(vec![Column::new(TypeId::Int32, "a", false)]);
    let key = Schema::new(vec![Column::new(TypeId::Int32, "a", false)]);
    let err = IndexMetadata::new("bad", 1, tuple, key, vec![1], false, IndexKind::BwTree)
        .unwrap_err();
    assert!(matches!(err, ArborError::InvalidSchema(_)));
}

// =============================================================================
// Differential
// =============================================================================

#[test]
fn test_bwtree_matches_btree() {
    let config = IndexConfig {
        delta_chain_threshold: 3,
        leaf_max_entries: 6,
        inner_max_entries: 5,
        ..IndexConfig::default()
    };
    let types = [TypeId::Int32];
    let bw = build_index(IndexKind::BwTree, false, &types, &config);
    let bt = build_index(IndexKind::BTree, false, &types, &config);

    let mut rng = rand::rng();
    for _ in 0..20_000 {
        let key = vec![Value::Int32(rng.random_range(-500..500))];
        let l = ItemPointer::new(rng.random_range(0..3), rng.random_range(0..2));
        match rng.random_range(0..10) {
            0..=5 => {
                bw.insert_entry(&key, l).unwrap();
                bt.insert_entry(&key, l).unwrap();
            }
            6..=8 => {
                assert_eq!(
                    bw.delete_entry(&key, l).unwrap(),
                    bt.delete_entry(&key, l).unwrap()
                );
            }
            _ => {
                let mut a = bw.scan_key(&key).unwrap();
                let mut b = bt.scan_key(&key).unwrap();
                a.sort();
                b.sort();
                assert_eq!(a, b);
            }
        }
    }

    let normalize = |index: &Index| {
        index
            .scan_all_keys()
            .unwrap()
            .into_iter()
            .map(|(k, mut v)| {
                v.sort();
                (k, v)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(normalize(&bw), normalize(&bt));

    let stats = bw.container().as_bwtree().unwrap().stats().snapshot();
    println!("bwtree stats after differential run: {:?}", stats);
    assert!(stats.consolidations > 0);
}
