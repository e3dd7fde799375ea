//! Error types for `vecstore`.
//!
//! Every fallible operation returns a [`Result`] carrying a typed [`Error`].
//! Error codes follow the pattern `VEC-XXX` for easy cross-referencing in
//! logs and bug reports.

use thiserror::Error;

/// Result type alias for `vecstore` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `vecstore` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument was invalid (null path, zero dims, zero `n`).
    #[error("[VEC-001] invalid argument: {0}")]
    InvalidArgument(String),

    /// An id passed to `replace`, `delete`, or similar was out of range.
    #[error("[VEC-002] invalid id: {id} (count is {count})")]
    InvalidId {
        /// The out-of-range id.
        id: usize,
        /// The store's current count.
        count: usize,
    },

    /// Opening the backing file failed.
    #[error("[VEC-003] failed to open store file: {0}")]
    FileOpen(#[source] std::io::Error),

    /// Establishing or tearing down the memory mapping failed.
    #[error("[VEC-004] memory-mapping failed: {0}")]
    Mmap(#[source] std::io::Error),

    /// A resize/grow allocation failed.
    #[error("[VEC-005] allocation failed: {0}")]
    Alloc(#[source] std::io::Error),

    /// Truncating the backing file failed.
    #[error("[VEC-006] truncation failed: {0}")]
    Truncate(#[source] std::io::Error),

    /// Spawning a worker thread failed.
    #[error("[VEC-007] thread creation failed: {0}")]
    Thread(#[source] std::io::Error),

    /// A configuration value could not be parsed or was out of range.
    #[error("[VEC-008] configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the stable short code for this error (e.g. `"VEC-002"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "VEC-001",
            Self::InvalidId { .. } => "VEC-002",
            Self::FileOpen(_) => "VEC-003",
            Self::Mmap(_) => "VEC-004",
            Self::Alloc(_) => "VEC-005",
            Self::Truncate(_) => "VEC-006",
            Self::Thread(_) => "VEC-007",
            Self::Config(_) => "VEC-008",
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
