/// Default lower bound on the number of containers handed to one shard.
pub const DEFAULT_MIN_CONTAINERS_PER_SHARD: usize = 16;

/// Tuning for in-place and superset merges.
///
/// The receiver's containers are split into
/// `clamp(containers / min_containers_per_shard, 1, max_concurrency)` shards.
/// The defaults run every merge sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeConfig {
    /// Upper bound on the number of shards merged in parallel.
    pub max_concurrency: usize,
    /// Smallest number of containers worth a shard of its own.
    pub min_containers_per_shard: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            min_containers_per_shard: DEFAULT_MIN_CONTAINERS_PER_SHARD,
        }
    }
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_min_containers_per_shard(mut self, min_containers_per_shard: usize) -> Self {
        self.min_containers_per_shard = min_containers_per_shard;
        self
    }
}
