//! Bounded-memory byte and line access to large files
//!
//! `blockview` lets a caller treat an arbitrarily large file as an indexable
//! byte array, and on top of that as an indexable array of text lines, while
//! only ever holding a fixed number of fixed-size blocks in memory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            Application              │
//! └─────────────────────────────────────┘
//!                  │ get(line)
//! ┌─────────────────────────────────────┐
//! │   LineIndex                         │
//! │   boundaries + bounded line cache   │
//! └─────────────────────────────────────┘
//!                  │ byte_at(pos)
//! ┌─────────────────────────────────────┐
//! │   BlockCache                        │
//! │   fixed arena, FIFO eviction,       │
//! │   last-block fast path, mtime check │
//! └─────────────────────────────────────┘
//!                  │ seek + read
//! ┌─────────────────────────────────────┐
//! │            Backing file             │
//! └─────────────────────────────────────┘
//! ```
//!
//! [`WholeFile`] and [`TextFile`] load the entire file instead and follow the
//! same semantics, for small inputs and for comparison.
//!
//! # Staleness
//!
//! The block cache records the file's modification time. With the default
//! [`StalenessCheck::EveryAccess`] policy every public access stats the file
//! first; a strictly later modification time purges every resident block and
//! re-derives the size. The line index notices the purge and rescans before
//! serving the next line.
//!
//! # Usage
//!
//! ```no_run
//! use blockview::{BlockCache, BlockCacheConfig, LineIndex, LineIndexConfig, Terminator};
//!
//! # fn example() -> blockview::Result<()> {
//! let mut cache = BlockCache::open(
//!     "big.bin",
//!     BlockCacheConfig::new().with_block_size(4096).with_max_blocks(8),
//! )?;
//! let byte = cache.byte_at(1_000_000)?;
//!
//! let mut lines = LineIndex::open(
//!     "big.log",
//!     LineIndexConfig::new().with_terminator(Terminator::CrLf),
//! )?;
//! let tenth = lines.get(9)?;
//! # let _ = (byte, tenth);
//! # Ok(())
//! # }
//! ```
//!
//! Neither cache is thread-safe. Every access takes `&mut self`; share an
//! instance behind a mutex if needed.

#![warn(missing_docs)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns

pub mod block_cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod line_index;
pub mod stats;
pub mod terminator;
pub mod text_file;
pub mod whole_file;

mod source;

// Re-export commonly used types
pub use block_cache::BlockCache;
pub use config::{BlockCacheConfig, LineIndexConfig, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE, StalenessCheck};
pub use error::{BlockViewError, Result};
pub use line_index::LineIndex;
pub use stats::{BlockCacheStats, LineIndexStats};
pub use terminator::Terminator;
pub use text_file::TextFile;
pub use whole_file::{Endian, WholeFile};
