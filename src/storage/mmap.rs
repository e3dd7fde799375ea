//! Memory-mapped backing file for a [`crate::Store`].
//!
//! The file's bytes are the canonical representation of the vector
//! array; there is no header, index, or WAL. On open, an existing file
//! is adopted verbatim and its length becomes the logical `file_size`.
//! Growth doubles the mapped capacity so appends are amortized O(1); a
//! separate logical `file_size` tracks how many bytes are actually in
//! use within that (possibly larger) mapping.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Memory-mapped backing file: one `File`, one optional `MmapMut`, and
/// the logical/mapped size bookkeeping described in the data model.
pub(crate) struct MappedFile {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    /// Bytes currently holding live embedding data.
    file_size: u64,
    /// Bytes currently covered by `mmap`, if any. `capacity >= file_size`.
    capacity: u64,
    /// Bumped on every remap so long-lived borrows can be asserted against
    /// a stale mapping instead of silently reading freed memory.
    remap_epoch: AtomicU64,
}

impl MappedFile {
    /// Opens `path` for read/write, creating it if absent. If the file is
    /// non-empty, the whole file is mapped read/write/shared immediately.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(Error::FileOpen)?;

        let file_size = file.metadata().map_err(Error::FileOpen)?.len();

        let mmap = if file_size == 0 {
            None
        } else {
            // SAFETY: `file` is open for read/write and has non-zero length,
            // satisfying `MmapMut::map_mut`'s requirements.
            Some(unsafe { MmapMut::map_mut(&file).map_err(Error::Mmap)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            file_size,
            capacity: file_size,
            remap_epoch: AtomicU64::new(0),
        })
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    pub(crate) fn remap_epoch(&self) -> u64 {
        self.remap_epoch.load(Ordering::Acquire)
    }

    /// Advances the logical size after the caller has written into the
    /// already-capacious mapping. Never shrinks; use [`Self::resize`] for
    /// that.
    pub(crate) fn set_file_size(&mut self, new_size: u64) {
        debug_assert!(new_size <= self.capacity);
        self.file_size = new_size;
    }

    /// Ensures the mapping covers at least `bytes`, growing by repeated
    /// doubling from `max(capacity, min_capacity)` when it does not.
    /// Does not advance `file_size`; the caller does that after writing.
    pub(crate) fn ensure_capacity(
        &mut self,
        bytes: u64,
        min_capacity: u64,
        min_growth: u64,
        growth_factor: u64,
    ) -> Result<()> {
        if bytes <= self.capacity {
            return Ok(());
        }

        let mut new_capacity = self.capacity.max(min_capacity).max(1);
        while new_capacity < bytes {
            new_capacity = new_capacity
                .saturating_mul(growth_factor)
                .max(new_capacity.saturating_add(min_growth));
        }

        self.file.set_len(new_capacity).map_err(Error::Alloc)?;
        self.remap(new_capacity)?;
        Ok(())
    }

    /// Unmaps, truncates the file to exactly `new_size` bytes, and
    /// updates `file_size`. Does not remap; callers that need read/write
    /// access afterward must call [`Self::remap`] explicitly.
    pub(crate) fn resize(&mut self, new_size: u64) -> Result<()> {
        self.mmap = None;
        self.file.set_len(new_size).map_err(Error::Truncate)?;
        self.file_size = new_size;
        self.capacity = new_size;
        Ok(())
    }

    /// Tears down the current mapping, if any, and establishes a new one
    /// of exactly `new_capacity` bytes. A `new_capacity` of `0` leaves the
    /// file unmapped.
    pub(crate) fn remap(&mut self, new_capacity: u64) -> Result<()> {
        self.mmap = None;
        if new_capacity == 0 {
            self.capacity = 0;
            return Ok(());
        }
        // SAFETY: the file has just been sized to `new_capacity` bytes by
        // the caller (or was already that size), so the mapping range is
        // fully backed by the file.
        let mmap = unsafe { MmapMut::map_mut(&self.file).map_err(Error::Mmap)? };
        self.mmap = Some(mmap);
        self.capacity = new_capacity;
        self.remap_epoch.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Read-only view of the bytes currently backed by the mapping.
    pub(crate) fn as_slice(&self) -> &[u8] {
        match &self.mmap {
            Some(m) => m,
            None => &[],
        }
    }

    /// Mutable view of the bytes currently backed by the mapping.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.mmap {
            Some(m) => m,
            None => &mut [],
        }
    }

    /// Flushes pending writes to the backing file.
    pub(crate) fn flush(&self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush().map_err(Error::Mmap)?;
        }
        Ok(())
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Unmaps, flushes, and truncates the on-disk file down to
    /// `file_size`. Growth overshoots `file_size` to amortize appends, but
    /// nothing records that overshoot outside of this in-memory struct, so
    /// without this truncation a reopen would read the inflated on-disk
    /// length and report phantom trailing zero slots. The `File` handle
    /// closes when `self` drops.
    pub(crate) fn close(mut self) -> Result<()> {
        self.flush()?;
        self.mmap = None;
        if self.capacity != self.file_size {
            self.file.set_len(self.file_size).map_err(Error::Truncate)?;
        }
        Ok(())
    }
}
