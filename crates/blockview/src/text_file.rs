//! Whole-file line splitting
//!
//! Same line semantics as [`LineIndex`](crate::LineIndex), but the file is
//! held in memory and split with `memchr`. Useful for small files and for
//! checking the cached path against a straightforward one.

use crate::{
    error::{BlockViewError, Result},
    line_index::line_span,
    terminator::Terminator,
    whole_file::WholeFile,
};
use memchr::memchr_iter;
use std::fs::File;
use std::path::Path;

/// Text file held and split in memory
#[derive(Debug)]
pub struct TextFile {
    file: WholeFile,
    terminator: Terminator,
    /// Sentinel 0 followed by the last byte position of each terminator
    boundaries: Vec<u64>,
}

impl TextFile {
    /// Read and split a file by path
    pub fn open(path: impl AsRef<Path>, terminator: Terminator) -> Result<Self> {
        Ok(Self::split(WholeFile::open(path)?, terminator))
    }

    /// Read and split an already open handle
    pub fn from_file(file: File, terminator: Terminator) -> Result<Self> {
        Ok(Self::split(WholeFile::from_file(file)?, terminator))
    }

    /// Split a caller-supplied buffer
    pub fn from_bytes(data: impl Into<Vec<u8>>, terminator: Terminator) -> Self {
        Self::split(WholeFile::from_bytes(data), terminator)
    }

    fn split(file: WholeFile, terminator: Terminator) -> Self {
        let mut text = Self {
            file,
            terminator,
            boundaries: Vec::new(),
        };
        text.find_boundaries();
        text
    }

    fn find_boundaries(&mut self) {
        let data = self.file.as_bytes();
        self.boundaries.clear();
        if data.is_empty() {
            return;
        }
        self.boundaries.push(0);

        let positions = match self.terminator {
            Terminator::Lf => memchr_iter(b'\n', data).collect::<Vec<_>>(),
            Terminator::Cr => memchr_iter(b'\r', data).collect(),
            Terminator::CrLf => memchr_iter(b'\n', data)
                .filter(|&pos| pos > 0 && data[pos - 1] == b'\r')
                .collect(),
        };
        self.boundaries
            .extend(positions.into_iter().map(|pos| pos as u64));
    }

    /// Re-read the backing file, if any, and split it again
    pub fn refresh(&mut self) -> Result<()> {
        self.file.reload()?;
        self.find_boundaries();
        Ok(())
    }

    /// Number of lines, zero for an empty file
    pub fn line_count(&self) -> u64 {
        self.boundaries.len() as u64
    }

    /// Whether the data ends with a terminator
    pub fn last_is_terminator(&self) -> bool {
        self.terminator.terminates(self.file.as_bytes())
    }

    /// Terminator style used for splitting
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Raw bytes of a line
    pub fn line_bytes(&self, line: u64) -> Result<&[u8]> {
        let count = self.line_count();
        if line >= count {
            return Err(BlockViewError::LineOutOfRange { line, count });
        }
        let range = line_span(
            &self.boundaries,
            line as usize,
            self.terminator.width(),
            self.file.size(),
        );
        Ok(&self.file.as_bytes()[range.start as usize..range.end as usize])
    }

    /// Line text without its terminator. Invalid UTF-8 is replaced.
    pub fn line(&self, line: u64) -> Result<String> {
        Ok(String::from_utf8_lossy(self.line_bytes(line)?).into_owned())
    }

    /// Every line in order
    pub fn lines(&self) -> Vec<String> {
        (0..self.line_count())
            .filter_map(|line| self.line(line).ok())
            .collect()
    }

    /// Underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.file.as_bytes()
    }
}
