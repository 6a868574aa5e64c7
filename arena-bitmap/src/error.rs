use thiserror::Error;

/// Errors reported by bitmap operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied buffer cannot hold the compacted bitmap.
    #[error("buffer too small: need {needed} words, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// A superset merge found a source key the receiver does not have.
    #[error("source key {key:#x} is missing from the destination bitmap")]
    NotASuperset { key: u64 },

    /// A word buffer does not hold a well-formed bitmap.
    #[error("malformed bitmap buffer: {reason}")]
    Malformed { reason: &'static str },
}

/// A specialized Result type for bitmap operations.
pub type Result<T> = std::result::Result<T, Error>;
