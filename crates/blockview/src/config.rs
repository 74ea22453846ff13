//! Block cache and line index configuration
//!
//! Every parameter is validated eagerly when a cache or index is built.
//! Out-of-range values are rejected, never clamped.

use crate::terminator::Terminator;
use serde::{Deserialize, Serialize};

/// Smallest accepted block size in bytes
pub const MIN_BLOCK_SIZE: usize = 256;

/// Largest accepted block size in bytes
pub const MAX_BLOCK_SIZE: usize = 65535;

/// When the backing file is checked for modification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessCheck {
    /// Check before every public byte or line access
    #[default]
    EveryAccess,
    /// Only check on explicit `file_check()` or `reset()`
    Manual,
}

/// Block cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockCacheConfig {
    /// Bytes per block (256 to 65535)
    pub block_size: usize,
    /// Number of blocks held in memory at once (at least 1)
    pub max_blocks: usize,
    /// Zero a block's buffer when it is evicted or purged
    pub zero_on_evict: bool,
    /// Modification check policy
    pub staleness: StalenessCheck,
}

impl Default for BlockCacheConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            max_blocks: 16,
            zero_on_evict: false,
            staleness: StalenessCheck::EveryAccess,
        }
    }
}

impl BlockCacheConfig {
    /// Create a new block cache configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set block size
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set number of resident blocks
    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    /// Enable or disable zeroing of evicted blocks
    pub fn with_zero_on_evict(mut self, zero: bool) -> Self {
        self.zero_on_evict = zero;
        self
    }

    /// Set modification check policy
    pub fn with_staleness(mut self, staleness: StalenessCheck) -> Self {
        self.staleness = staleness;
        self
    }

    /// Total arena size in bytes, if it fits in `usize`
    pub fn arena_bytes(&self) -> Option<usize> {
        self.block_size.checked_mul(self.max_blocks)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_blocks == 0 {
            return Err("max_blocks must be greater than 0".to_string());
        }

        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(format!(
                "block_size must be between {MIN_BLOCK_SIZE} and {MAX_BLOCK_SIZE}, got {}",
                self.block_size
            ));
        }

        Ok(())
    }
}

/// Line index configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineIndexConfig {
    /// Configuration of the underlying block cache
    pub cache: BlockCacheConfig,
    /// Maximum number of materialized lines kept (0 disables line caching)
    pub max_lines_held: usize,
    /// Terminator style
    pub terminator: Terminator,
}

impl Default for LineIndexConfig {
    fn default() -> Self {
        Self {
            cache: BlockCacheConfig::default(),
            max_lines_held: 256,
            terminator: Terminator::Lf,
        }
    }
}

impl LineIndexConfig {
    /// Create a new line index configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block cache configuration
    pub fn with_cache(mut self, cache: BlockCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set line cache capacity
    pub fn with_max_lines_held(mut self, max_lines_held: usize) -> Self {
        self.max_lines_held = max_lines_held;
        self
    }

    /// Set terminator style
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate().map_err(|e| format!("cache: {e}"))
    }
}
