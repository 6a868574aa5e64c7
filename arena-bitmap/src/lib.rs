//! Compressed bitmaps of `u64` values stored in a single word arena.
//!
//! ```
//! use arena_bitmap::Bitmap;
//!
//! let mut a = Bitmap::new();
//! a.set(1);
//! a.set(70_000);
//!
//! let b: Bitmap = [70_000, 90_000].into_iter().collect();
//! assert_eq!(a.and(&b).to_vec(), vec![70_000]);
//!
//! a.or_assign(&b);
//! assert_eq!(a.cardinality(), 3);
//! ```

#[macro_use]
extern crate static_assertions;

mod arena;
mod bitmap;
mod config;
mod container;
mod error;
mod fill;
mod iter;
mod keys;
mod merge;
mod partition;
#[cfg(feature = "roaring")]
mod roaring;
#[cfg(feature = "serde")]
mod serde_impl;

#[cfg(test)]
mod tests_container;
#[cfg(test)]
mod tests_bitmap;
#[cfg(test)]
mod tests_fill;

pub use bitmap::Bitmap;
pub use config::{DEFAULT_MIN_CONTAINERS_PER_SHARD, MergeConfig};
pub use container::{MAX_CARDINALITY, MAX_CONTAINER_SIZE};
pub use error::{Error, Result};
pub use iter::Iter;
pub use merge::{ContainerBuffer, Op};
