//! Bounded-memory random access to a large file
//!
//! The file is divided into fixed-size blocks and at most `max_blocks` of
//! them are held in a single arena allocated up front. Blocks are evicted in
//! the order they were loaded (oldest load first). Re-reading a resident
//! block does not refresh its position, so this is FIFO, not LRU.
//!
//! ```text
//!   file:   | blk 0 | blk 1 | blk 2 | blk 3 | ... | blk n (short) |
//!                       \        \
//!   arena:  [ slot 0 ][ slot 1 ][ slot 2 ]      (max_blocks slots)
//!   load order (front evicted first): 2, 1, ...
//! ```

use crate::{
    config::{BlockCacheConfig, StalenessCheck},
    error::{BlockViewError, Result},
    source::Backing,
    stats::BlockCacheStats,
};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Most recently dereferenced block and where its bytes start in the arena
#[derive(Debug, Clone, Copy)]
struct LastAccess {
    block: u64,
    base: usize,
}

/// Fixed-capacity block cache over a regular file
///
/// Not thread-safe: every access takes `&mut self`. Wrap it in a mutex if it
/// has to be shared.
#[derive(Debug)]
pub struct BlockCache {
    backing: Backing,
    config: BlockCacheConfig,
    data_size: u64,
    block_count: u64,
    /// `max_blocks * block_size` bytes, slot `i` at `i * block_size`
    arena: Vec<u8>,
    /// Block number held by each slot
    slots: Vec<Option<u64>>,
    /// Block number to slot index
    residency: HashMap<u64, usize>,
    /// Resident blocks, oldest load first
    load_order: VecDeque<u64>,
    last_access: Option<LastAccess>,
    /// `None` until the first file check
    last_modified: Option<SystemTime>,
    generation: u64,
    stats: BlockCacheStats,
}

impl BlockCache {
    /// Open a file by path
    pub fn open(path: impl AsRef<Path>, config: BlockCacheConfig) -> Result<Self> {
        config
            .validate()
            .map_err(BlockViewError::InvalidConfiguration)?;
        let backing = Backing::open_path(path.as_ref())?;
        Self::with_backing(backing, config)
    }

    /// Use an already open file handle
    pub fn from_file(file: File, config: BlockCacheConfig) -> Result<Self> {
        config
            .validate()
            .map_err(BlockViewError::InvalidConfiguration)?;
        let backing = Backing::from_handle(file)?;
        Self::with_backing(backing, config)
    }

    fn with_backing(backing: Backing, config: BlockCacheConfig) -> Result<Self> {
        let arena_bytes = config.arena_bytes().ok_or_else(|| {
            BlockViewError::Allocation(format!(
                "{} blocks of {} bytes overflows the address space",
                config.max_blocks, config.block_size
            ))
        })?;

        let mut arena = Vec::new();
        arena.try_reserve_exact(arena_bytes).map_err(|e| {
            BlockViewError::Allocation(format!("block arena of {arena_bytes} bytes: {e}"))
        })?;
        arena.resize(arena_bytes, 0);

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.max_blocks)
            .map_err(|e| BlockViewError::Allocation(format!("slot table: {e}")))?;
        slots.resize(config.max_blocks, None);

        let mut cache = Self {
            backing,
            residency: HashMap::with_capacity(config.max_blocks.min(1024)),
            load_order: VecDeque::with_capacity(config.max_blocks.min(1024)),
            config,
            data_size: 0,
            block_count: 0,
            arena,
            slots,
            last_access: None,
            last_modified: None,
            generation: 0,
            stats: BlockCacheStats::default(),
        };
        cache.file_check()?;

        debug!(
            "Block cache over {}: {} bytes, {} blocks of {}, arena {} slots",
            cache.backing.label().display(),
            cache.data_size,
            cache.block_count,
            cache.config.block_size,
            cache.config.max_blocks
        );
        Ok(cache)
    }

    /// Independent cache over the same file.
    ///
    /// Path sources are reopened and handle sources duplicated. No resident
    /// blocks are shared; the copy starts empty with its own staleness baseline.
    pub fn try_clone(&self) -> Result<Self> {
        Self::with_backing(self.backing.try_clone()?, self.config.clone())
    }

    // ---------------------------------------------------------------
    // Staleness

    /// Stat the backing file and purge every block if it was modified.
    ///
    /// Only a strictly later modification time counts as a change. A rewrite
    /// that keeps the same timestamp is not detected.
    pub fn file_check(&mut self) -> Result<()> {
        self.stats.file_checks += 1;
        let metadata = self.backing.stat().inspect_err(|e| {
            warn!("File check failed for {}: {e}", self.backing.label().display());
        })?;
        let modified = metadata.modified().ok();

        match (self.last_modified, modified) {
            (None, _) => self.last_modified = modified,
            (Some(previous), Some(current)) if current > previous => {
                info!(
                    "{} modified since last check, purging {} resident blocks",
                    self.backing.label().display(),
                    self.residency.len()
                );
                self.purge();
                self.backing.reopen()?;
                self.last_modified = Some(current);
            }
            _ => {}
        }

        self.set_data_size(metadata.len());
        Ok(())
    }

    /// Purge all resident blocks and re-derive the data size
    pub fn reset(&mut self) -> Result<()> {
        self.purge();
        self.backing.reopen()?;
        self.file_check()
    }

    pub(crate) fn check_if_due(&mut self) -> Result<()> {
        match self.config.staleness {
            StalenessCheck::EveryAccess => self.file_check(),
            StalenessCheck::Manual => Ok(()),
        }
    }

    fn purge(&mut self) {
        if self.config.zero_on_evict {
            for slot in 0..self.slots.len() {
                if self.slots[slot].is_some() {
                    self.zero_slot(slot);
                }
            }
        }
        self.slots.fill(None);
        self.residency.clear();
        self.load_order.clear();
        self.last_access = None;
        self.generation += 1;
        self.stats.resets += 1;
    }

    fn set_data_size(&mut self, size: u64) {
        self.data_size = size;
        self.block_count = size.div_ceil(self.config.block_size as u64);
    }

    // ---------------------------------------------------------------
    // Arena management

    fn slot_base(&self, slot: usize) -> usize {
        slot * self.config.block_size
    }

    fn zero_slot(&mut self, slot: usize) {
        let base = self.slot_base(slot);
        self.arena[base..base + self.config.block_size].fill(0);
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self.load_order.pop_front() else {
            return;
        };
        if let Some(slot) = self.residency.remove(&oldest) {
            if self.config.zero_on_evict {
                self.zero_slot(slot);
            }
            self.slots[slot] = None;
            debug!("Evicted block {oldest} from slot {slot}");
        }
        if self.last_access.is_some_and(|last| last.block == oldest) {
            self.last_access = None;
        }
        self.stats.evictions += 1;
    }

    /// Make `block` resident and return its slot. Callers check the range.
    fn load_block(&mut self, block: u64) -> Result<usize> {
        if let Some(&slot) = self.residency.get(&block) {
            return Ok(slot);
        }

        if self.residency.len() >= self.config.max_blocks {
            self.evict_oldest();
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| BlockViewError::Allocation("no free arena slot".to_string()))?;

        let block_size = self.config.block_size;
        let base = self.slot_base(slot);
        let offset = block * block_size as u64;
        let read = self
            .backing
            .read_at(offset, &mut self.arena[base..base + block_size])?;

        let is_final = block + 1 == self.block_count;
        if read < block_size && !is_final {
            return Err(BlockViewError::ShortRead {
                block,
                expected: block_size,
                actual: read,
            });
        }

        self.slots[slot] = Some(block);
        self.load_order.push_back(block);
        self.residency.insert(block, slot);
        self.stats.block_loads += 1;
        debug!("Loaded block {block} into slot {slot} ({read} bytes)");
        Ok(slot)
    }

    // ---------------------------------------------------------------
    // Access

    /// Byte at an absolute position, loading its block on demand.
    ///
    /// Under [`StalenessCheck::EveryAccess`] each call stats the backing file
    /// first, one syscall per byte. Bulk readers should switch to
    /// [`StalenessCheck::Manual`] or copy whole blocks with
    /// [`copy_range`](Self::copy_range).
    pub fn byte_at(&mut self, pos: u64) -> Result<u8> {
        self.check_if_due()?;
        self.fetch(pos)
    }

    /// Byte access without the staleness check
    pub(crate) fn fetch(&mut self, pos: u64) -> Result<u8> {
        if pos >= self.data_size {
            return Err(BlockViewError::PositionOutOfRange {
                pos,
                size: self.data_size,
            });
        }

        let block_size = self.config.block_size as u64;
        let block = pos / block_size;
        let offset = (pos % block_size) as usize;

        if let Some(last) = self.last_access
            && last.block == block
        {
            self.stats.fast_path_hits += 1;
            return Ok(self.arena[last.base + offset]);
        }

        if self.residency.contains_key(&block) {
            self.stats.resident_hits += 1;
        }
        let slot = self.load_block(block)?;
        let base = self.slot_base(slot);
        self.last_access = Some(LastAccess { block, base });
        Ok(self.arena[base + offset])
    }

    /// Load a block ahead of use. Out-of-range block numbers are ignored.
    pub fn preload(&mut self, block: u64) -> Result<()> {
        if block < self.block_count {
            self.load_block(block)?;
        }
        Ok(())
    }

    /// Copy up to `dest.len()` bytes of a block into `dest`.
    ///
    /// `dest` is zero-filled first. A resident block is copied from memory;
    /// otherwise the bytes are read straight from the file and the block is
    /// not cached. At most the block's valid bytes are copied. Returns the
    /// number of bytes copied.
    pub fn copy_range(&mut self, dest: &mut [u8], block: u64) -> Result<usize> {
        self.check_if_due()?;
        self.check_block(block)?;
        dest.fill(0);

        let len = dest.len().min(self.valid_len(block));
        if let Some(&slot) = self.residency.get(&block) {
            let base = self.slot_base(slot);
            dest[..len].copy_from_slice(&self.arena[base..base + len]);
            return Ok(len);
        }

        let offset = block * self.config.block_size as u64;
        let read = self.backing.read_at(offset, &mut dest[..len])?;
        self.stats.bypass_reads += 1;
        debug!("Bypass read of block {block}: {read} bytes");
        Ok(read)
    }

    /// Owned copy of a block, `block_size` bytes long.
    ///
    /// The block is loaded into the cache. Bytes past the end of the final
    /// block are zero.
    pub fn copy_block(&mut self, block: u64) -> Result<Vec<u8>> {
        self.check_if_due()?;
        self.check_block(block)?;

        let slot = self.load_block(block)?;
        let base = self.slot_base(slot);
        let len = self.valid_len(block);

        let mut out = vec![0u8; self.config.block_size];
        out[..len].copy_from_slice(&self.arena[base..base + len]);
        Ok(out)
    }

    /// Whole file in one buffer, bypassing the block cache.
    ///
    /// All or nothing: returns `None` if the buffer cannot be allocated or
    /// the file cannot be read in full.
    pub fn read_all(&self) -> Option<Vec<u8>> {
        let len = usize::try_from(self.data_size).ok()?;
        let mut buf = Vec::new();
        if let Err(e) = buf.try_reserve_exact(len) {
            debug!("Whole-file read of {len} bytes not allocated: {e}");
            return None;
        }
        buf.resize(len, 0);

        match self.backing.read_at(0, &mut buf) {
            Ok(read) if read == len => Some(buf),
            Ok(read) => {
                debug!("Whole-file read came back short: {read} of {len} bytes");
                None
            }
            Err(e) => {
                debug!("Whole-file read failed: {e}");
                None
            }
        }
    }

    fn check_block(&self, block: u64) -> Result<()> {
        if block >= self.block_count {
            return Err(BlockViewError::BlockOutOfRange {
                block,
                count: self.block_count,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Introspection

    /// Size of the file data in bytes
    pub fn size(&self) -> u64 {
        self.data_size
    }

    /// Bytes per block
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Number of blocks, zero for an empty file
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Arena capacity in blocks
    pub fn max_blocks(&self) -> usize {
        self.config.max_blocks
    }

    /// `size % block_size`; zero when the size is an exact multiple
    pub fn last_block_size(&self) -> usize {
        (self.data_size % self.config.block_size as u64) as usize
    }

    /// Bytes of file data held by `block`, zero if out of range
    pub fn valid_len(&self, block: u64) -> usize {
        if block >= self.block_count {
            return 0;
        }
        let start = block * self.config.block_size as u64;
        (self.data_size - start).min(self.config.block_size as u64) as usize
    }

    /// Whether `block` is resident
    pub fn is_block_loaded(&self, block: u64) -> bool {
        self.residency.contains_key(&block)
    }

    /// Resident blocks, oldest load first
    pub fn loaded_blocks(&self) -> Vec<u64> {
        self.load_order.iter().copied().collect()
    }

    /// Number of resident blocks
    pub fn resident_count(&self) -> usize {
        self.residency.len()
    }

    /// Incremented whenever resident blocks are purged
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Modification time recorded at the last check
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    /// Active configuration
    pub fn config(&self) -> &BlockCacheConfig {
        &self.config
    }

    /// Counter snapshot
    pub fn stats(&self) -> BlockCacheStats {
        self.stats
    }

    /// Zero buffers when blocks are evicted or purged
    pub fn set_zero_on_evict(&mut self, zero: bool) {
        self.config.zero_on_evict = zero;
    }

    /// Change the modification check policy
    pub fn set_staleness(&mut self, staleness: StalenessCheck) {
        self.config.staleness = staleness;
    }
}
