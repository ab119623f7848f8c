//! Byte source and sink abstractions
//!
//! The archive core never opens files itself. Reading goes through a
//! [`ByteSource`] (size plus read-at-offset, safe for concurrent readers) and
//! writing through a sequential [`ByteSink`].

use crate::error::{ArchiveError, Result};

/// Random-access byte source backing a dearchiver.
///
/// `read_at` must be safe to call from multiple threads at once; the
/// dearchiver performs bulk reads outside its locks.
pub trait ByteSource: Send + Sync {
    /// Total size in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `dst` from `offset`; short reads are errors
    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<()>;
}

/// Sequential byte sink fed by the archiver
pub trait ByteSink {
    fn write_all(&mut self, data: &[u8]) -> Result<()>;
}

impl<W: std::io::Write> ByteSink for W {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, data)?;
        Ok(())
    }
}

/// In-memory byte source over an owned blob
#[derive(Debug, Clone)]
pub struct MemoryByteSource {
    bytes: Vec<u8>,
}

impl MemoryByteSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemoryByteSource { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemoryByteSource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, offset: u64, dst: &mut [u8]) -> Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| ArchiveError::corrupt("read offset out of range"))?;
        let end = start
            .checked_add(dst.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                ArchiveError::corrupt(format!(
                    "read of {} bytes at offset {} exceeds source size {}",
                    dst.len(),
                    offset,
                    self.bytes.len()
                ))
            })?;
        dst.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}
