//! Backing storage for a [`crate::Store`]: a single memory-mapped file
//! whose bytes are the canonical vector array.
//!
//! # Module Structure
//!
//! - [`mmap`]: the memory-mapped file itself (`MappedFile`)
//! - `vector_bytes`: zero-copy `&[f32]` <-> `&[u8]` slot conversions

mod mmap;
mod vector_bytes;

pub(crate) use mmap::MappedFile;
pub(crate) use vector_bytes::{bytes_to_f32_slice, f32_slice_to_bytes};
