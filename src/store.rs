//! The store itself: durable append, in-place replace, tombstone
//! delete, trailing compaction, and the borrowed-view accessor.
//!
//! All mutating operations hold the store's single exclusive mutex for
//! their full duration. `get`, `count`, and `dims` are read-only
//! snapshots; callers are still responsible for not racing them against
//! mutations issued from another thread, per the store's concurrency
//! contract.

use parking_lot::{Mutex, MutexGuard};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::storage::{bytes_to_f32_slice, f32_slice_to_bytes, MappedFile};

pub(crate) struct Inner {
    pub(crate) mapped: MappedFile,
    pub(crate) dims: usize,
}

impl Inner {
    fn slot_bytes(&self) -> u64 {
        (self.dims * std::mem::size_of::<f32>()) as u64
    }

    pub(crate) fn count(&self) -> usize {
        (self.mapped.file_size() / self.slot_bytes()) as usize
    }

    fn slot_offset(&self, id: usize) -> usize {
        id * self.dims * std::mem::size_of::<f32>()
    }

    fn slot_bytes_at(&self, id: usize) -> &[u8] {
        let off = self.slot_offset(id);
        let len = self.dims * std::mem::size_of::<f32>();
        &self.mapped.as_slice()[off..off + len]
    }

    fn slot_bytes_at_mut(&mut self, id: usize) -> &mut [u8] {
        let off = self.slot_offset(id);
        let len = self.dims * std::mem::size_of::<f32>();
        &mut self.mapped.as_mut_slice()[off..off + len]
    }

    fn is_zero_slot(&self, id: usize) -> bool {
        self.slot_bytes_at(id).iter().all(|&b| b == 0)
    }

    fn first_zero_slot(&self) -> Option<usize> {
        (0..self.count()).find(|&i| self.is_zero_slot(i))
    }
}

/// A borrowed, read-only view of one embedding's `D` floats.
///
/// Holds the store's mutex for its lifetime: any call that needs
/// exclusive access (`append`, `replace`, `delete`, `compact`, `close`)
/// from another thread blocks until the view is dropped, and a call to
/// one of them from the *same* thread while a view is alive will
/// deadlock. Drop the view before mutating.
pub struct VectorView<'a> {
    guard: MutexGuard<'a, Inner>,
    id: usize,
}

impl Deref for VectorView<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        bytes_to_f32_slice(self.guard.slot_bytes_at(self.id), self.guard.dims)
    }
}

/// An embedded single-file store of fixed-dimension `f32` embeddings.
pub struct Store {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) pool: Mutex<Option<WorkerPool>>,
    pub(crate) config: StoreConfig,
    path: PathBuf,
}

impl Store {
    /// Opens (creating if absent) the store at `path` for `dims`-wide
    /// embeddings, using default configuration.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be opened or mapped,
    /// or [`Error::InvalidArgument`] if an existing file's length is not
    /// a multiple of `dims * 4`.
    pub fn open(path: impl AsRef<Path>, dims: std::num::NonZeroUsize) -> Result<Self> {
        Self::open_with_config(path, dims, StoreConfig::default())
    }

    /// Opens the store at `path` with an explicit [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid, or a storage
    /// error if the file cannot be opened or mapped. If an existing
    /// file's length is not a multiple of `dims * 4`, this is rejected
    /// as [`Error::InvalidArgument`] rather than silently truncating the
    /// remainder.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        dims: std::num::NonZeroUsize,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let dims = dims.get();

        let path = path.as_ref().to_path_buf();
        let mapped = MappedFile::open(&path)?;

        let slot_bytes = (dims * std::mem::size_of::<f32>()) as u64;
        if mapped.file_size() % slot_bytes != 0 {
            return Err(Error::InvalidArgument(format!(
                "existing file size {} is not a multiple of dims*4 ({slot_bytes})",
                mapped.file_size()
            )));
        }

        debug!(path = %path.display(), dims, "store opened");
        Ok(Self {
            inner: Mutex::new(Inner { mapped, dims }),
            pool: Mutex::new(None),
            config,
            path,
        })
    }

    /// Path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Vector dimensionality fixed for the lifetime of this store.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.inner.lock().dims
    }

    /// Current number of slots (live and tombstoned).
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().count()
    }

    /// Computes the cosine similarity between two `dims()`-wide vectors,
    /// validating their length against this store's fixed dimension
    /// rather than trusting the caller the way [`crate::cosine`] (the
    /// dimension-agnostic free function) does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either vector's length does
    /// not equal `dims()`.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        let dims = self.inner.lock().dims;
        if a.len() != dims || b.len() != dims {
            return Err(Error::InvalidArgument(format!(
                "expected {dims} floats for both operands, got {} and {}",
                a.len(),
                b.len()
            )));
        }
        Ok(crate::kernel::cosine(a, b))
    }

    /// Calls [`Self::append`] with this store's configured
    /// [`StoreConfig::default_reuse`] rather than an explicit flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `data.len() != dims()`.
    pub fn append_default(&self, data: &[f32]) -> Result<usize> {
        self.append(data, self.config.default_reuse)
    }

    /// Appends `data` as a new embedding, or overwrites the
    /// lowest-indexed zeroed slot when `reuse` is `true` and one exists.
    ///
    /// Returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `data.len() != dims()`.
    pub fn append(&self, data: &[f32], reuse: bool) -> Result<usize> {
        let mut inner = self.inner.lock();
        if data.len() != inner.dims {
            return Err(Error::InvalidArgument(format!(
                "expected {} floats, got {}",
                inner.dims,
                data.len()
            )));
        }

        if reuse {
            if let Some(id) = inner.first_zero_slot() {
                trace!(id, "append: reusing zeroed slot");
                let bytes = f32_slice_to_bytes(data);
                inner.slot_bytes_at_mut(id).copy_from_slice(bytes);
                return Ok(id);
            }
        }

        let slot_bytes = inner.slot_bytes();
        let new_id = inner.count();
        let required = inner.mapped.file_size() + slot_bytes;
        inner.mapped.ensure_capacity(
            required,
            self.config.initial_capacity,
            self.config.min_growth,
            self.config.growth_factor,
        )?;
        inner.mapped.set_file_size(required);

        let bytes = f32_slice_to_bytes(data);
        inner.slot_bytes_at_mut(new_id).copy_from_slice(bytes);
        Ok(new_id)
    }

    /// Overwrites the embedding at `id` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `data.len() != dims()`, or
    /// [`Error::InvalidId`] if `id >= count()`.
    pub fn replace(&self, id: usize, data: &[f32]) -> Result<()> {
        let mut inner = self.inner.lock();
        if data.len() != inner.dims {
            return Err(Error::InvalidArgument(format!(
                "expected {} floats, got {}",
                inner.dims,
                data.len()
            )));
        }
        let count = inner.count();
        if id >= count {
            return Err(Error::InvalidId { id, count });
        }
        let bytes = f32_slice_to_bytes(data);
        inner.slot_bytes_at_mut(id).copy_from_slice(bytes);
        Ok(())
    }

    /// Zeroes the slot at `id`, tombstoning it. Does not change `count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if `id >= count()`.
    pub fn delete(&self, id: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        let count = inner.count();
        if id >= count {
            return Err(Error::InvalidId { id, count });
        }
        inner.slot_bytes_at_mut(id).fill(0);
        Ok(())
    }

    /// Borrows the embedding at `id`, or `None` if `id >= count()`.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<VectorView<'_>> {
        let guard = self.inner.lock();
        if id >= guard.count() {
            return None;
        }
        Some(VectorView { guard, id })
    }

    /// `true` iff the slot at `id` is all-zero, or `id >= count()`.
    #[must_use]
    pub fn is_zeroed(&self, id: usize) -> bool {
        let inner = self.inner.lock();
        id >= inner.count() || inner.is_zero_slot(id)
    }

    /// Truncates the trailing run of zeroed slots. Interior zeroed slots
    /// are preserved; `count` never grows. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the truncate/remap fails.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let count = inner.count();
        if count == 0 {
            return Ok(());
        }

        let mut k = count;
        while k > 0 && inner.is_zero_slot(k - 1) {
            k -= 1;
        }

        if k == count {
            return Ok(());
        }

        let slot_bytes = inner.slot_bytes();
        let new_size = k as u64 * slot_bytes;
        debug!(from = count, to = k, "compact: truncating trailing zeros");
        inner.mapped.resize(new_size)?;
        if new_size > 0 {
            inner.mapped.remap(new_size)?;
        }
        Ok(())
    }

    /// Releases the mapping, file handle, and worker pool. When
    /// `compact_first` is set, [`Self::compact`] runs before teardown;
    /// its error (if any) is still returned, but teardown proceeds
    /// regardless so resources are always released.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, from compaction or from
    /// flushing the mapping.
    pub fn close(self, compact_first: bool) -> Result<()> {
        let compact_result = if compact_first { self.compact() } else { Ok(()) };

        *self.pool.lock() = None;
        let inner = self.inner.into_inner();
        let close_result = inner.mapped.close();

        compact_result.and(close_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn store(dims: usize) -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let store = Store::open(&path, nz(dims)).unwrap();
        (dir, store)
    }

    #[test]
    fn open_append_close_reopen_count() {
        let dir = tempdir().unwrap();
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
        let v = store.get(1).unwrap();
        assert_eq!(&*v, &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn tombstone_and_reuse() {
        let (_dir, store) = store(4);
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
    fn append_default_uses_configured_reuse_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let config = StoreConfig {
            default_reuse: true,
            ..StoreConfig::default()
        };
        let store = Store::open_with_config(&path, nz(2), config).unwrap();

        store.append(&[1.0, 1.0], false).unwrap();
        store.append(&[2.0, 2.0], false).unwrap();
        store.delete(0).unwrap();

        let id = store.append_default(&[9.0, 9.0]).unwrap();
        assert_eq!(id, 0);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn reuse_without_zero_slot_equals_plain_append() {
        let (_dir, store) = store(2);
        store.append(&[1.0, 1.0], true).unwrap();
        let id = store.append(&[2.0, 2.0], true).unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn replace_rejects_out_of_range_id() {
        let (_dir, store) = store(2);
        store.append(&[1.0, 1.0], false).unwrap();
        assert!(matches!(
            store.replace(5, &[2.0, 2.0]),
            Err(Error::InvalidId { id: 5, count: 1 })
        ));
    }

    #[test]
    fn delete_rejects_out_of_range_id() {
        let (_dir, store) = store(2);
        assert!(matches!(
            store.delete(0),
            Err(Error::InvalidId { id: 0, count: 0 })
        ));
    }

    #[test]
    fn get_out_of_range_is_none() {
        let (_dir, store) = store(2);
        assert!(store.get(0).is_none());
    }

    #[test]
    fn is_zeroed_true_for_out_of_range() {
        let (_dir, store) = store(2);
        assert!(store.is_zeroed(0));
    }

    #[test]
    fn similarity_matches_kernel_cosine() {
        let (_dir, store) = store(4);
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0, 0.0];
        assert!((store.similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_rejects_wrong_dims() {
        let (_dir, store) = store(4);
        assert!(matches!(
            store.similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0, 0.0]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn append_rejects_wrong_dims() {
        let (_dir, store) = store(3);
        assert!(matches!(
            store.append(&[1.0, 2.0], false),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn compact_truncates_trailing_zeros_preserves_interior() {
        let (_dir, store) = store(2);
        for i in 0..10u32 {
            store.append(&[i as f32, i as f32], false).unwrap();
        }
        store.delete(3).unwrap();
        store.delete(8).unwrap();
        store.delete(9).unwrap();

        store.compact().unwrap();

        assert_eq!(store.count(), 8);
        assert!(store.is_zeroed(3));
        assert!(store.is_zeroed(8)); // out of range now
        assert!(store.is_zeroed(9));
    }

    #[test]
    fn compact_is_idempotent() {
        let (_dir, store) = store(2);
        store.append(&[1.0, 1.0], false).unwrap();
        store.compact().unwrap();
        store.compact().unwrap();
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn open_rejects_dims_mismatch_remainder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let store = Store::open(&path, nz(4)).unwrap();
            store.append(&[1.0, 2.0, 3.0, 4.0], false).unwrap();
            store.close(false).unwrap();
        }
        assert!(Store::open(&path, nz(3)).is_err());
    }
}
