//! Whole-file in-memory reader
//!
//! Loads the entire backing file at once. Used as a comparison path for the
//! block cache and for small files where bounding memory does not matter.

use crate::{
    error::{BlockViewError, Result},
    source::Backing,
};
use std::fs::File;
use std::io::{Error as IoError, ErrorKind};
use std::path::Path;
use tracing::debug;

/// Byte order for integer reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,
    /// Byte order of the host
    Native,
}

/// Entire file contents held in memory
#[derive(Debug)]
pub struct WholeFile {
    /// `None` for caller-supplied buffers
    source: Option<Backing>,
    data: Vec<u8>,
}

impl WholeFile {
    /// Read a file by path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let backing = Backing::open_path(path.as_ref())?;
        let data = read_backing(&backing)?;
        Ok(Self {
            source: Some(backing),
            data,
        })
    }

    /// Read from an already open handle, starting at offset 0
    pub fn from_file(file: File) -> Result<Self> {
        let backing = Backing::from_handle(file)?;
        let data = read_backing(&backing)?;
        Ok(Self {
            source: Some(backing),
            data,
        })
    }

    /// Wrap a caller-supplied buffer
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: None,
            data: data.into(),
        }
    }

    /// Re-read the backing file. Buffers without a file are left unchanged.
    pub fn reload(&mut self) -> Result<()> {
        if let Some(backing) = self.source.as_mut() {
            backing.reopen()?;
            self.data = read_backing(backing)?;
        }
        Ok(())
    }

    /// Number of bytes held
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Whether the file is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Byte at an absolute position
    pub fn byte_at(&self, pos: u64) -> Result<u8> {
        let [byte] = self.array_at::<1>(pos)?;
        Ok(byte)
    }

    /// 16-bit integer starting at `pos`
    pub fn u16_at(&self, pos: u64, endian: Endian) -> Result<u16> {
        let bytes = self.array_at(pos)?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Native => u16::from_ne_bytes(bytes),
        })
    }

    /// 32-bit integer starting at `pos`
    pub fn u32_at(&self, pos: u64, endian: Endian) -> Result<u32> {
        let bytes = self.array_at(pos)?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Native => u32::from_ne_bytes(bytes),
        })
    }

    /// 64-bit integer starting at `pos`
    pub fn u64_at(&self, pos: u64, endian: Endian) -> Result<u64> {
        let bytes = self.array_at(pos)?;
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Native => u64::from_ne_bytes(bytes),
        })
    }

    /// `N` bytes starting at `pos`; the last of them must lie inside the data
    fn array_at<const N: usize>(&self, pos: u64) -> Result<[u8; N]> {
        let out_of_range = || BlockViewError::PositionOutOfRange {
            pos,
            size: self.size(),
        };
        let start = usize::try_from(pos).map_err(|_| out_of_range())?;
        let end = start.checked_add(N).ok_or_else(out_of_range)?;
        self.data
            .get(start..end)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(out_of_range)
    }
}

/// Read everything the backing file currently holds
pub(crate) fn read_backing(backing: &Backing) -> Result<Vec<u8>> {
    let size = backing.stat()?.len();
    let len = usize::try_from(size).map_err(|_| {
        BlockViewError::Allocation(format!("{size} bytes does not fit in memory"))
    })?;

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|e| BlockViewError::Allocation(format!("whole file of {len} bytes: {e}")))?;
    data.resize(len, 0);

    let read = backing.read_at(0, &mut data)?;
    if read < len {
        return Err(BlockViewError::access(
            format!("read of {}", backing.label().display()),
            IoError::new(
                ErrorKind::UnexpectedEof,
                format!("expected {len} bytes, got {read}"),
            ),
        ));
    }

    debug!("Read {} whole ({len} bytes)", backing.label().display());
    Ok(data)
}
