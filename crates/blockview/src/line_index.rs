//! Line-oriented access on top of the block cache
//!
//! One forward scan records where every line ends. Lines are then
//! materialized on demand, byte by byte, through the block cache, and a small
//! bounded cache keeps the most recently produced lines. Like the block
//! cache, the line cache evicts in insertion order.
//!
//! Line `i` spans from just after terminator `i - 1` to just before
//! terminator `i`. A terminator at the very end of the file therefore starts
//! an empty final line, so joining the lines back with the terminator
//! reproduces the file exactly.

use crate::{
    block_cache::BlockCache,
    config::LineIndexConfig,
    error::{BlockViewError, Result},
    stats::LineIndexStats,
    terminator::Terminator,
};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Byte range of `line` given scanned boundaries.
///
/// `boundaries[0]` is a sentinel; every later entry is the position of the
/// last byte of a terminator. The caller guarantees `line < boundaries.len()`.
pub(crate) fn line_span(boundaries: &[u64], line: usize, width: u64, size: u64) -> Range<u64> {
    let start = if line == 0 { 0 } else { boundaries[line] + 1 };
    let end = match boundaries.get(line + 1) {
        Some(&next) => next + 1 - width,
        None => size,
    };
    start..end
}

/// Lazily materialized lines of a file
#[derive(Debug)]
pub struct LineIndex {
    cache: BlockCache,
    terminator: Terminator,
    max_lines_held: usize,
    /// Sentinel 0 followed by the last byte position of each terminator
    boundaries: Vec<u64>,
    last_is_terminator: bool,
    /// Data size seen by the last scan
    scanned_size: u64,
    /// Cache generation seen by the last scan
    scanned_generation: u64,
    lines: HashMap<u64, String>,
    /// Cached line numbers, oldest insertion first
    history: VecDeque<u64>,
    suppress_caching: bool,
    stats: LineIndexStats,
}

impl LineIndex {
    /// Open a file by path and scan it
    pub fn open(path: impl AsRef<Path>, config: LineIndexConfig) -> Result<Self> {
        config
            .validate()
            .map_err(BlockViewError::InvalidConfiguration)?;
        let cache = BlockCache::open(path, config.cache)?;
        Self::new(cache, config.max_lines_held, config.terminator)
    }

    /// Scan an already open handle
    pub fn from_file(file: File, config: LineIndexConfig) -> Result<Self> {
        config
            .validate()
            .map_err(BlockViewError::InvalidConfiguration)?;
        let cache = BlockCache::from_file(file, config.cache)?;
        Self::new(cache, config.max_lines_held, config.terminator)
    }

    /// Build an index over an existing cache and scan it
    pub fn new(cache: BlockCache, max_lines_held: usize, terminator: Terminator) -> Result<Self> {
        let mut index = Self {
            cache,
            terminator,
            max_lines_held,
            boundaries: Vec::new(),
            last_is_terminator: false,
            scanned_size: 0,
            scanned_generation: 0,
            lines: HashMap::new(),
            history: VecDeque::new(),
            suppress_caching: false,
            stats: LineIndexStats::default(),
        };
        index.scan()?;
        Ok(index)
    }

    /// Record every line boundary in one forward pass.
    ///
    /// The previous boundaries are kept if any read fails.
    fn scan(&mut self) -> Result<()> {
        self.cache.check_if_due()?;

        let size = self.cache.size();
        let mut boundaries = Vec::new();
        if size > 0 {
            boundaries.push(0);
        }

        let mut pos = 0;
        while pos < size {
            let current = self.cache.fetch(pos)?;
            let next = if self.terminator == Terminator::CrLf && current == b'\r' && pos + 1 < size
            {
                Some(self.cache.fetch(pos + 1)?)
            } else {
                None
            };

            let probe = self.terminator.probe(current, next);
            if probe.is_terminator {
                boundaries.push(pos + probe.consumed - 1);
            }
            pos += probe.consumed;
        }

        let width = self.terminator.width();
        let last_is_terminator = if size >= width {
            let mut tail = Vec::with_capacity(2);
            for pos in size - width..size {
                tail.push(self.cache.fetch(pos)?);
            }
            self.terminator.terminates(&tail)
        } else {
            false
        };

        self.boundaries = boundaries;
        self.last_is_terminator = last_is_terminator;
        self.scanned_size = size;
        self.scanned_generation = self.cache.generation();
        self.stats.scans += 1;
        debug!(
            "Scanned {size} bytes: {} lines ({} terminator)",
            self.line_count(),
            self.terminator
        );
        Ok(())
    }

    /// Run the cache's staleness check and rescan if its blocks were purged
    fn sync(&mut self) -> Result<()> {
        self.cache.check_if_due()?;
        if self.cache.generation() != self.scanned_generation {
            debug!("Block cache was reset, rescanning lines");
            self.refresh()?;
        }
        Ok(())
    }

    /// Number of lines, zero for an empty file
    pub fn line_count(&self) -> u64 {
        self.boundaries.len() as u64
    }

    /// Whether the file ends with a terminator
    pub fn last_is_terminator(&self) -> bool {
        self.last_is_terminator
    }

    /// Terminator style the index was built with
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Half-open byte range of a line as of the last scan
    pub fn line_range(&self, line: u64) -> Result<Range<u64>> {
        self.check_line(line)?;
        Ok(line_span(
            &self.boundaries,
            line as usize,
            self.terminator.width(),
            self.scanned_size,
        ))
    }

    fn check_line(&self, line: u64) -> Result<()> {
        let count = self.line_count();
        if line >= count {
            return Err(BlockViewError::LineOutOfRange { line, count });
        }
        Ok(())
    }

    /// Line text without its terminator. Invalid UTF-8 is replaced.
    pub fn get(&mut self, line: u64) -> Result<String> {
        self.sync()?;
        self.lookup(line)
    }

    fn lookup(&mut self, line: u64) -> Result<String> {
        self.check_line(line)?;

        if let Some(text) = self.lines.get(&line) {
            self.stats.line_hits += 1;
            return Ok(text.clone());
        }
        self.stats.line_misses += 1;

        let bytes = self.read_line(line)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if !self.suppress_caching {
            self.remember(line, &text);
        }
        Ok(text)
    }

    fn remember(&mut self, line: u64, text: &str) {
        if self.max_lines_held == 0 {
            return;
        }
        if self.lines.len() >= self.max_lines_held
            && let Some(oldest) = self.history.pop_front()
        {
            self.lines.remove(&oldest);
        }
        self.lines.insert(line, text.to_string());
        self.history.push_back(line);
    }

    /// Raw bytes of a line, never cached
    pub fn line_bytes(&mut self, line: u64) -> Result<Vec<u8>> {
        self.sync()?;
        self.check_line(line)?;
        self.read_line(line)
    }

    fn read_line(&mut self, line: u64) -> Result<Vec<u8>> {
        let range = self.line_range(line)?;
        let mut bytes = Vec::with_capacity(range.end.saturating_sub(range.start) as usize);
        for pos in range {
            bytes.push(self.cache.fetch(pos)?);
        }
        Ok(bytes)
    }

    /// Every line in order. Lines produced here are not added to the line cache.
    pub fn all_lines(&mut self) -> Result<Vec<String>> {
        self.sync()?;
        self.suppress_caching = true;
        let result: Result<Vec<String>> = (0..self.line_count())
            .map(|line| self.lookup(line))
            .collect();
        self.suppress_caching = false;
        result
    }

    /// Drop every cached line
    pub fn purge(&mut self) {
        self.lines.clear();
        self.history.clear();
    }

    /// Drop cached lines and rescan boundaries
    pub fn refresh(&mut self) -> Result<()> {
        self.purge();
        self.scan()
    }

    /// Number of lines currently cached
    pub fn cached_line_count(&self) -> usize {
        self.lines.len()
    }

    /// Cached line numbers, oldest insertion first
    pub fn cached_lines(&self) -> Vec<u64> {
        self.history.iter().copied().collect()
    }

    /// Counter snapshot
    pub fn stats(&self) -> LineIndexStats {
        self.stats
    }

    /// Underlying block cache
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Mutable access to the block cache. A reset made through it is noticed
    /// on the next line access.
    pub fn cache_mut(&mut self) -> &mut BlockCache {
        &mut self.cache
    }

    /// Give back the block cache
    pub fn into_inner(self) -> BlockCache {
        self.cache
    }
}
