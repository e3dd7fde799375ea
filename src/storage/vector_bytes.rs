//! Zero-copy conversion between `&[f32]` vectors and the raw `&[u8]`
//! slots of the mapped file.

/// Reinterprets a vector slice as its raw little-/native-endian bytes.
///
/// # Safety
///
/// Safe because `f32` has no invalid bit patterns and the slice is
/// contiguous; the returned slice borrows from `vector`.
#[inline]
pub(crate) fn f32_slice_to_bytes(vector: &[f32]) -> &[u8] {
    // SAFETY: f32 has no invalid bit patterns, the slice is contiguous,
    // and the borrow is tied to `vector`'s lifetime.
    unsafe {
        std::slice::from_raw_parts(vector.as_ptr().cast::<u8>(), std::mem::size_of_val(vector))
    }
}

/// Reinterprets a byte slot as a vector of `dims` `f32`s without copying.
///
/// # Panics
///
/// Panics if `bytes.len() < dims * 4` or if `bytes` is not 4-byte
/// aligned. All slot offsets inside a [`super::MappedFile`] are
/// multiples of `dims * 4`, so alignment holds as long as the mapping's
/// base address is itself 4-byte aligned, which every mainstream mmap
/// implementation guarantees (pages are aligned far beyond 4 bytes).
#[inline]
pub(crate) fn bytes_to_f32_slice(bytes: &[u8], dims: usize) -> &[f32] {
    let needed = dims * std::mem::size_of::<f32>();
    assert!(
        bytes.len() >= needed,
        "bytes_to_f32_slice: slot too small ({} < {needed})",
        bytes.len()
    );
    assert_eq!(
        bytes.as_ptr() as usize % std::mem::align_of::<f32>(),
        0,
        "bytes_to_f32_slice: slot is not f32-aligned"
    );
    // SAFETY: length and alignment were just checked; the returned slice
    // borrows from `bytes`.
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<f32>(), dims) }
}
