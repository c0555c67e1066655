/// Lookup counters for the Query Cache: all lookups are O(1), so the only
/// thing worth reporting is hit/miss rate and how many entries got loaded.
/// There is no eviction or memory-pressure tracking since the cache is
/// never partially evicted, only rebuilt wholesale between runs.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
