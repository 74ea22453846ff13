//! Backing file handling shared by the cached and whole-file readers

use crate::error::{BlockViewError, Result};
use std::fs::{File, Metadata};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How the backing file was supplied
#[derive(Debug)]
enum Origin {
    /// Opened by path; stat goes through the path so removal is noticed
    Path(PathBuf),
    /// Supplied as an open handle; stat goes through the handle
    Handle,
}

/// An open, regular, seekable backing file
#[derive(Debug)]
pub(crate) struct Backing {
    origin: Origin,
    file: File,
}

impl Backing {
    /// Stat, validate, and open a file by path
    pub(crate) fn open_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| BlockViewError::file(path, format!("stat failed: {e}")))?;
        if !metadata.is_file() {
            return Err(BlockViewError::NotRegularFile(path.to_path_buf()));
        }

        let file = File::open(path)
            .map_err(|e| BlockViewError::file(path, format!("open failed: {e}")))?;

        debug!("Opened {} ({} bytes)", path.display(), metadata.len());
        Ok(Self {
            origin: Origin::Path(path.to_path_buf()),
            file,
        })
    }

    /// Validate an already open handle
    pub(crate) fn from_handle(file: File) -> Result<Self> {
        let metadata = file
            .metadata()
            .map_err(|e| BlockViewError::file(HANDLE_LABEL, format!("stat failed: {e}")))?;
        if !metadata.is_file() {
            return Err(BlockViewError::NotRegularFile(PathBuf::from(HANDLE_LABEL)));
        }

        Ok(Self {
            origin: Origin::Handle,
            file,
        })
    }

    /// Path used in error messages
    pub(crate) fn label(&self) -> &Path {
        match &self.origin {
            Origin::Path(path) => path,
            Origin::Handle => Path::new(HANDLE_LABEL),
        }
    }

    /// Current metadata of the backing file, rejecting non-regular files
    pub(crate) fn stat(&self) -> Result<Metadata> {
        let metadata = match &self.origin {
            Origin::Path(path) => std::fs::metadata(path),
            Origin::Handle => self.file.metadata(),
        }
        .map_err(|e| BlockViewError::file(self.label(), format!("file check failed: {e}")))?;

        if !metadata.is_file() {
            return Err(BlockViewError::NotRegularFile(self.label().to_path_buf()));
        }
        Ok(metadata)
    }

    /// Reopen a path source so a file replaced on disk is picked up.
    /// Handle sources keep their handle.
    pub(crate) fn reopen(&mut self) -> Result<()> {
        if let Origin::Path(path) = &self.origin {
            self.file = File::open(path)
                .map_err(|e| BlockViewError::file(path, format!("reopen failed: {e}")))?;
        }
        Ok(())
    }

    /// Independent source over the same file
    pub(crate) fn try_clone(&self) -> Result<Self> {
        match &self.origin {
            Origin::Path(path) => Self::open_path(path),
            Origin::Handle => {
                let file = self.file.try_clone().map_err(|e| {
                    BlockViewError::file(HANDLE_LABEL, format!("handle clone failed: {e}"))
                })?;
                Self::from_handle(file)
            }
        }
    }

    /// Seek to `offset` and fill as much of `buf` as the file allows.
    /// Returns the number of bytes read; fewer than `buf.len()` means end of file.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| BlockViewError::access(format!("seek to offset {offset}"), e))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(BlockViewError::access(
                        format!("read at offset {}", offset + filled as u64),
                        e,
                    ));
                }
            }
        }
        Ok(filled)
    }
}

const HANDLE_LABEL: &str = "<handle>";
