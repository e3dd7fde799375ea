//! `vecstore`: an embedded, single-file store for fixed-dimension
//! `f32` embeddings.
//!
//! A store is one memory-mapped file holding a flat array of
//! `dims`-wide vector slots, no header, no index. It supports durable
//! append, in-place replace, tombstone-style delete, trailing
//! compaction, and exact top-N cosine similarity search, optionally
//! parallelized across a worker pool.
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use vecstore::{Direction, Store, Threads};
//!
//! # fn main() -> vecstore::Result<()> {
//! let store = Store::open("embeddings.bin", NonZeroUsize::new(4).unwrap())?;
//! let id = store.append(&[0.1, 0.2, 0.3, 0.4], true)?;
//! let n = NonZeroUsize::new(5).unwrap();
//! let hits = store.search(&[0.1, 0.2, 0.3, 0.4], n, Direction::MostSimilar, Threads::Auto)?;
//! assert_eq!(hits[0].0, id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod heap;
mod kernel;
mod pool;
mod search;
mod storage;
mod store;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use heap::Direction;
pub use kernel::{cosine, dot, norm};
pub use search::Threads;
pub use store::{Store, VectorView};
