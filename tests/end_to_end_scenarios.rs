//! End-to-end scenarios exercising the store and search together, one
//! per documented use case.

use std::num::NonZeroUsize;
use tempfile::tempdir;
use vecstore::{Direction, Store, Threads};

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[allow(clippy::cast_precision_loss)]
fn generate_vector(dim: usize, seed: u64) -> Vec<f32> {
    let mut v = Vec::with_capacity(dim);
    let mut x = seed.wrapping_add(1);
    for _ in 0..dim {
        x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        v.push((x as f32 / u64::MAX as f32) * 2.0 - 1.0);
    }
    v
}

#[test]
fn open_append_close_reopen_count() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("store.bin");

    {
        let store = Store::open(&path, nz(4)).unwrap();
        store.append(&[1.0, 0.0, 0.0, 0.0], false).unwrap();
        store.append(&[0.0, 1.0, 0.0, 0.0], false).unwrap();
        store.append(&[0.0, 0.0, 1.0, 0.0], false).unwrap();
        store.close(false).unwrap();
    }

    let store = Store::open(&path, nz(4)).unwrap();
    assert_eq!(store.count(), 3);
    let view = store.get(1).unwrap();
    assert_eq!(&*view, &[0.0, 1.0, 0.0, 0.0]);
}

#[test]
fn tombstone_and_reuse() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("store.bin"), nz(4)).unwrap();

    store.append(&[1.0, 0.0, 0.0, 0.0], false).unwrap();
    store.append(&[0.0, 1.0, 0.0, 0.0], false).unwrap();
    store.append(&[0.0, 0.0, 1.0, 0.0], false).unwrap();

    store.delete(1).unwrap();
    assert!(store.is_zeroed(1));

    let id = store.append(&[5.0, 5.0, 5.0, 5.0], true).unwrap();
    assert_eq!(id, 1);
    assert_eq!(store.count(), 3);
}

#[test]
fn top_3_most_similar() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("store.bin"), nz(4)).unwrap();

    store.append(&[1.0, 0.0, 0.0, 0.0], false).unwrap(); // 0
    store.append(&[0.0, 1.0, 0.0, 0.0], false).unwrap(); // 1
    store.append(&[0.0, 0.0, 1.0, 0.0], false).unwrap(); // 2
    store.append(&[0.0, 0.0, 0.0, 1.0], false).unwrap(); // 3
    store.append(&[0.9, 0.1, 0.0, 0.0], false).unwrap(); // 4

    let results = store
        .search(&[1.0, 0.0, 0.0, 0.0], nz(3), Direction::MostSimilar, Threads::Single)
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, 0);
    assert!((results[0].1 - 1.0).abs() < 1e-6);
    assert_eq!(results[1].0, 4);
    assert!((results[1].1 - 0.9939).abs() < 1e-3);
    assert!([1, 2, 3].contains(&results[2].0));
    assert!(results[2].1.abs() < 1e-6);
}

#[test]
fn top_3_least_similar() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("store.bin"), nz(4)).unwrap();

    store.append(&[1.0, 0.0, 0.0, 0.0], false).unwrap(); // 0
    store.append(&[0.0, 1.0, 0.0, 0.0], false).unwrap(); // 1
    store.append(&[0.0, 0.0, 1.0, 0.0], false).unwrap(); // 2
    store.append(&[0.0, 0.0, 0.0, 1.0], false).unwrap(); // 3
    store.append(&[0.9, 0.1, 0.0, 0.0], false).unwrap(); // 4

    let results = store
        .search(&[1.0, 0.0, 0.0, 0.0], nz(3), Direction::LeastSimilar, Threads::Single)
        .unwrap();

    assert_eq!(results.len(), 3);
    let ids: Vec<usize> = results.iter().map(|(id, _)| *id).collect();
    for id in &ids {
        assert!([1, 2, 3].contains(id));
    }
    for (_, score) in &results {
        assert!(score.abs() < 1e-6);
    }
}

#[test]
fn parallel_parity_single_vs_auto() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("store.bin"), nz(8)).unwrap();

    for seed in 0..200u64 {
        store.append(&generate_vector(8, seed), false).unwrap();
    }

    let query = generate_vector(8, 999);
    let single = store
        .search(&query, nz(10), Direction::MostSimilar, Threads::Single)
        .unwrap();
    let auto = store
        .search(&query, nz(10), Direction::MostSimilar, Threads::Auto)
        .unwrap();

    let single_ids: Vec<usize> = single.iter().map(|(id, _)| *id).collect();
    let auto_ids: Vec<usize> = auto.iter().map(|(id, _)| *id).collect();
    assert_eq!(single_ids, auto_ids);

    for ((_, s1), (_, s2)) in single.iter().zip(auto.iter()) {
        assert!((s1 - s2).abs() < 1e-4, "scores diverged: {s1} vs {s2}");
    }
}

#[test]
fn compact_truncation() {
    let dir = tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("store.bin"), nz(2)).unwrap();

    for i in 0..10u32 {
        store.append(&[i as f32, i as f32], false).unwrap();
    }
    store.delete(3).unwrap();
    store.delete(8).unwrap();
    store.delete(9).unwrap();

    store.compact().unwrap();

    assert_eq!(store.count(), 8);
    assert!(store.is_zeroed(3));
    assert!(store.is_zeroed(8));
    assert!(store.is_zeroed(9));
}

#[test]
fn reopen_is_byte_identical() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("store.bin");

    let before: Vec<f32> = generate_vector(16, 42);
    {
        let store = Store::open(&path, nz(16)).unwrap();
        store.append(&before, false).unwrap();
        store.close(false).unwrap();
    }

    let store = Store::open(&path, nz(16)).unwrap();
    assert_eq!(store.count(), 1);
    let view = store.get(0).unwrap();
    assert_eq!(&*view, before.as_slice());
}

#[test]
fn close_compacts_before_releasing_when_requested() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("store.bin");

    {
        let store = Store::open(&path, nz(2)).unwrap();
        store.append(&[1.0, 1.0], false).unwrap();
        store.append(&[2.0, 2.0], false).unwrap();
        store.delete(1).unwrap();
        store.close(true).unwrap();
    }

    let store = Store::open(&path, nz(2)).unwrap();
    assert_eq!(store.count(), 1);
}
