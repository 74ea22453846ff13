//! Error types for block cache and line index operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while accessing a backing file
#[derive(Debug, Error)]
pub enum BlockViewError {
    /// Invalid constructor parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Backing file is missing, inaccessible, or could not be opened
    #[error("File error for {}: {reason}", path.display())]
    File {
        /// Path of the backing file (empty for handle sources)
        path: PathBuf,
        /// Why the file was rejected
        reason: String,
    },

    /// Backing file exists but is not a regular file
    #[error("Not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    /// Seek or read against the already open backing file failed
    #[error("File access failed during {operation}: {source}")]
    FileAccess {
        /// The operation that failed
        operation: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A block that is not the final block returned fewer bytes than a full block
    #[error("Short read on block {block}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Block number being loaded
        block: u64,
        /// Bytes required
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// Byte position at or beyond the data size
    #[error("Position {pos} out of range (size {size})")]
    PositionOutOfRange {
        /// Requested byte position
        pos: u64,
        /// Current data size
        size: u64,
    },

    /// Block number at or beyond the block count
    #[error("Block {block} out of range (block count {count})")]
    BlockOutOfRange {
        /// Requested block number
        block: u64,
        /// Current block count
        count: u64,
    },

    /// Line number at or beyond the line count
    #[error("Line {line} out of range (line count {count})")]
    LineOutOfRange {
        /// Requested line number
        line: u64,
        /// Current line count
        count: u64,
    },

    /// Memory for the block arena or a whole-file copy could not be reserved
    #[error("Allocation failed: {0}")]
    Allocation(String),
}

impl BlockViewError {
    pub(crate) fn file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn access(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileAccess {
            operation: operation.into(),
            source,
        }
    }

    /// True for position, block, and line range errors
    pub const fn is_range_error(&self) -> bool {
        matches!(
            self,
            Self::PositionOutOfRange { .. }
                | Self::BlockOutOfRange { .. }
                | Self::LineOutOfRange { .. }
        )
    }

    /// True for errors raised while opening or checking the backing file
    pub const fn is_file_error(&self) -> bool {
        matches!(self, Self::File { .. } | Self::NotRegularFile(_))
    }

    /// True for errors raised while reading from an already open file
    pub const fn is_access_error(&self) -> bool {
        matches!(self, Self::FileAccess { .. } | Self::ShortRead { .. })
    }
}

/// Result type alias for block view operations
pub type Result<T> = std::result::Result<T, BlockViewError>;
