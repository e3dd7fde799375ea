//! Exact top-N cosine similarity search, single- or multi-threaded.
//!
//! Multi-threaded search partitions `[0, count)` into contiguous ranges,
//! one per worker, and dispatches them through the store's
//! [`crate::pool::WorkerPool`]. Workers read the mapped bytes directly
//! through a raw snapshot captured while the store lock is held, rather
//! than re-acquiring that lock per vector. The store lock is released
//! before `pool.wait()` so an in-flight search never blocks a concurrent
//! mutation on another thread; callers are responsible for not issuing
//! one, since nothing here enforces it. The snapshot's remap epoch is
//! re-checked after the round as a debug-only guard against that
//! contract being violated.

use std::num::NonZeroUsize;

use crate::error::{Error, Result};
use crate::heap::{BoundedHeap, Direction};
use crate::kernel;
use crate::pool::WorkerPool;
use crate::store::Store;

/// Thread budget for a [`Store::search`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threads {
    /// Choose a thread count automatically: `min(available_parallelism,
    /// auto_thread_cap)`, from the store's [`crate::StoreConfig`].
    Auto,
    /// Scan on the calling thread; no pool is created.
    Single,
    /// Use exactly this many threads.
    Count(NonZeroUsize),
}

/// A raw, unsynchronized snapshot of the mapped vector array, valid only
/// for the remap epoch it was captured under.
///
/// # Safety
///
/// Constructing one requires that the referenced mapping outlive every
/// worker task spawned against it and that no mutation occurs while
/// those tasks run. [`Store::search`] does not hold the store lock for
/// that duration (mutations must not be blocked by an in-flight
/// search); instead this relies on the documented caller contract that
/// no mutating call runs concurrently with a search.
struct RawSnapshot {
    ptr: *const f32,
    len: usize,
    dims: usize,
    count: usize,
    epoch: u64,
}

// SAFETY: the snapshot is only ever read (never mutated) by worker
// threads, and the store's lock discipline guarantees the backing
// mapping is not remapped or dropped while a search round is in flight.
unsafe impl Send for RawSnapshot {}
unsafe impl Sync for RawSnapshot {}

impl RawSnapshot {
    fn vector(&self, id: usize) -> &[f32] {
        debug_assert!(id < self.count);
        let start = id * self.dims;
        debug_assert!(start + self.dims <= self.len);
        // SAFETY: `start + dims <= len` was just asserted, `ptr` is valid
        // for `len` elements for the snapshot's lifetime per the type's
        // safety contract, and the slice is read-only.
        unsafe { std::slice::from_raw_parts(self.ptr.add(start), self.dims) }
    }
}

/// A raw pointer wrapper whose only purpose is to cross the `Send`
/// boundary into a worker closure; the caller is responsible for the
/// pointer outliving every closure it's handed to.
struct SendPtr<T>(*const T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

// SAFETY: see call site; the pointee outlives every job that copies this.
unsafe impl<T> Send for SendPtr<T> {}

fn resolve_thread_count(threads: Threads, auto_cap: usize) -> usize {
    match threads {
        Threads::Single => 1,
        Threads::Count(n) => n.get(),
        Threads::Auto => {
            let available = std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1);
            available.min(auto_cap).max(1)
        }
    }
}

/// Splits `count` items into `parts` contiguous ranges, distributing the
/// remainder one-per-range to the first `count % parts` ranges so no
/// range differs from another by more than one element.
fn partition_ranges(count: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.min(count.max(1));
    if count == 0 || parts == 0 {
        return Vec::new();
    }
    let base = count / parts;
    let remainder = count % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < remainder);
        if size == 0 {
            continue;
        }
        ranges.push((start, start + size));
        start += size;
    }
    ranges
}

fn scan_range(snapshot: &RawSnapshot, query: &[f32], range: (usize, usize), direction: Direction, n: usize) -> BoundedHeap {
    let mut heap = BoundedHeap::new(n, direction);
    for id in range.0..range.1 {
        let candidate = snapshot.vector(id);
        if candidate.iter().all(|&x| x == 0.0) {
            continue;
        }
        let score = kernel::cosine(query, candidate);
        heap.push(id, score);
    }
    heap
}

fn merge_heaps(heaps: Vec<BoundedHeap>, n: usize, direction: Direction) -> Vec<(usize, f32)> {
    let mut merged = BoundedHeap::new(n, direction);
    for heap in heaps {
        for (id, score) in heap.into_sorted() {
            merged.push(id, score);
        }
    }
    merged.into_sorted()
}

impl Store {
    /// Returns up to `n` `(id, score)` pairs ranked by cosine similarity
    /// to `query`, in the order given by `direction`.
    ///
    /// Tombstoned (all-zero) slots are skipped during the scan and never
    /// appear in the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `query.len() != dims()`.
    pub fn search(
        &self,
        query: &[f32],
        n: NonZeroUsize,
        direction: Direction,
        threads: Threads,
    ) -> Result<Vec<(usize, f32)>> {
        let n = n.get();
        let inner = self.inner.lock();
        if query.len() != inner.dims {
            return Err(Error::InvalidArgument(format!(
                "expected {} floats, got {}",
                inner.dims,
                query.len()
            )));
        }
        let count = inner.count();
        if count == 0 {
            return Ok(Vec::new());
        }

        let thread_count = resolve_thread_count(threads, self.config.auto_thread_cap).min(count);

        if thread_count <= 1 {
            let snapshot = RawSnapshot {
                ptr: inner.mapped.as_slice().as_ptr().cast::<f32>(),
                len: count * inner.dims,
                dims: inner.dims,
                count,
                epoch: inner.mapped.remap_epoch(),
            };
            let heap = scan_range(&snapshot, query, (0, count), direction, n);
            debug_assert_eq!(inner.mapped.remap_epoch(), snapshot.epoch);
            drop(inner);
            return Ok(heap.into_sorted());
        }

        let ranges = partition_ranges(count, thread_count);
        let snapshot = RawSnapshot {
            ptr: inner.mapped.as_slice().as_ptr().cast::<f32>(),
            len: count * inner.dims,
            dims: inner.dims,
            count,
            epoch: inner.mapped.remap_epoch(),
        };

        let mut pool_slot = self.pool.lock();
        let needs_new = match pool_slot.as_ref() {
            Some(existing) => existing.worker_count() < ranges.len(),
            None => true,
        };
        if needs_new {
            *pool_slot = Some(WorkerPool::new(ranges.len())?);
        }

        // The store lock is dropped here, before `pool.wait()`, so that
        // mutating calls on another thread aren't blocked for the
        // duration of the scan. Soundness then rests on the documented
        // caller contract that no mutating call runs concurrently with
        // an in-flight search; `snapshot` would otherwise dangle under a
        // concurrent grow/remap.
        drop(inner);

        let pool = pool_slot.as_ref().expect("just initialized");

        let results: Vec<std::sync::Mutex<Option<BoundedHeap>>> =
            ranges.iter().map(|_| std::sync::Mutex::new(None)).collect();

        // SAFETY: `snapshot` and `results` are not dropped until after
        // `pool.wait()` below returns, by which point every submitted
        // job has already finished using its raw pointer.
        let snapshot_ptr = SendPtr(&snapshot as *const RawSnapshot);
        let results_ptr = SendPtr(results.as_ptr());

        for (slot_idx, range) in ranges.iter().copied().enumerate() {
            let query_vec = query.to_vec();
            let snapshot_ptr = snapshot_ptr;
            let results_ptr = results_ptr;
            pool.submit(move || {
                let snapshot_ptr = snapshot_ptr;
                let results_ptr = results_ptr;
                let snapshot = unsafe { &*snapshot_ptr.0 };
                let heap = scan_range(snapshot, &query_vec, range, direction, n);
                let result_slot = unsafe { &*results_ptr.0.add(slot_idx) };
                *result_slot.lock().unwrap() = Some(heap);
            });
        }
        pool.wait();
        drop(pool_slot);

        debug_assert_eq!(self.inner.lock().mapped.remap_epoch(), snapshot.epoch);

        let heaps: Vec<BoundedHeap> = results
            .into_iter()
            .map(|m| m.into_inner().unwrap().expect("every range is scanned before wait() returns"))
            .collect();

        Ok(merge_heaps(heaps, n, direction))
    }
}
