//! Access counters for the block cache and line index
//!
//! Both caches are single-threaded, so counters are plain integers rather
//! than atomics. Snapshots are cheap copies.

#![allow(clippy::cast_precision_loss)] // Ratios intentionally accept precision loss

use serde::Serialize;

/// Block cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCacheStats {
    /// Byte reads served by the last-accessed block without a residency lookup
    pub fast_path_hits: u64,
    /// Byte reads whose block was already resident
    pub resident_hits: u64,
    /// Blocks read from the backing file into the arena
    pub block_loads: u64,
    /// Blocks evicted to make room for another
    pub evictions: u64,
    /// Full purges, explicit or triggered by a modification
    pub resets: u64,
    /// Reads served straight from the file without populating the arena
    pub bypass_reads: u64,
    /// Stat calls against the backing file
    pub file_checks: u64,
}

impl BlockCacheStats {
    /// Fraction of byte reads that did not need a block load
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fast_path_hits + self.resident_hits;
        let total = hits + self.block_loads;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Line index counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineIndexStats {
    /// Lines served from the line cache
    pub line_hits: u64,
    /// Lines materialized through the block cache
    pub line_misses: u64,
    /// Full boundary scans
    pub scans: u64,
}

impl LineIndexStats {
    /// Fraction of line requests served from the line cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.line_hits + self.line_misses;
        if total == 0 {
            0.0
        } else {
            self.line_hits as f64 / total as f64
        }
    }
}
