//! Flash regions and their backends.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::FlashError;

/// Value of an erased flash byte.
pub const ERASED: u8 = 0xFF;

/// An erase/write target: a named partition made of fixed-size blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRegion {
    pub partition: String,
    pub block_size: u32,
    pub total_size: u32,
}

impl FlashRegion {
    pub fn new(partition: impl Into<String>, block_size: u32, total_size: u32) -> Self {
        Self {
            partition: partition.into(),
            block_size,
            total_size,
        }
    }

    pub fn block_count(&self) -> Result<u32, FlashError> {
        if self.block_size == 0 {
            return Err(FlashError::ZeroBlockSize);
        }
        Ok(self.total_size.div_ceil(self.block_size))
    }

    /// Byte range covered by block `index`, clipped to the region end.
    pub fn block_range(&self, index: u32) -> Result<(u32, usize), FlashError> {
        if index >= self.block_count()? {
            return Err(FlashError::OutOfBounds {
                offset: index.saturating_mul(self.block_size),
                length: self.block_size as usize,
                size: self.total_size,
            });
        }
        let start = index * self.block_size;
        let length = self.block_size.min(self.total_size - start);
        Ok((start, length as usize))
    }

    pub fn check(&self, offset: u32, length: usize) -> Result<(), FlashError> {
        let end = offset as u64 + length as u64;
        if end > self.total_size as u64 {
            return Err(FlashError::OutOfBounds {
                offset,
                length,
                size: self.total_size,
            });
        }
        Ok(())
    }
}

/// Block-erasable persistent storage.
///
/// Bytes must be erased before they are written. Implementations either
/// complete an operation or return an error; partial writes are not modelled.
pub trait Flash {
    fn region(&self) -> &FlashRegion;

    /// Erase one block, leaving every byte set to [`ERASED`].
    fn erase_block(&mut self, index: u32) -> Result<(), FlashError>;

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError>;
}

impl<F: Flash + ?Sized> Flash for Box<F> {
    fn region(&self) -> &FlashRegion {
        (**self).region()
    }

    fn erase_block(&mut self, index: u32) -> Result<(), FlashError> {
        (**self).erase_block(index)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write(offset, data)
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(offset, buf)
    }
}

/// One operation applied to a [`MemoryFlash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashOp {
    Erase(u32),
    Write { offset: u32, length: usize },
}

/// RAM-backed flash with NOR semantics: writes can only clear bits.
#[derive(Debug)]
pub struct MemoryFlash {
    region: FlashRegion,
    data: Vec<u8>,
    ops: Vec<FlashOp>,
}

impl MemoryFlash {
    pub fn new(region: FlashRegion) -> Self {
        let data = vec![ERASED; region.total_size as usize];
        Self {
            region,
            data,
            ops: Vec::new(),
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Every erase and write applied so far, in order.
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }
}

impl Flash for MemoryFlash {
    fn region(&self) -> &FlashRegion {
        &self.region
    }

    fn erase_block(&mut self, index: u32) -> Result<(), FlashError> {
        let (start, length) = self.region.block_range(index)?;
        let start = start as usize;
        self.data[start..start + length].fill(ERASED);
        self.ops.push(FlashOp::Erase(index));
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        self.region.check(offset, data.len())?;
        let start = offset as usize;
        for (cell, byte) in self.data[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
        self.ops.push(FlashOp::Write {
            offset,
            length: data.len(),
        });
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.region.check(offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

/// Flash region backed by a host file, with verify-after-write.
#[derive(Debug)]
pub struct FileFlash {
    region: FlashRegion,
    file: File,
}

impl FileFlash {
    /// Open or create the backing file, growing it to the region size with
    /// erased bytes if needed.
    pub fn open(path: impl AsRef<Path>, region: FlashRegion) -> Result<Self, FlashError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let current = file.metadata()?.len();
        if current < region.total_size as u64 {
            tracing::debug!(
                path = %path.display(),
                current,
                size = region.total_size,
                "extending flash backing file"
            );
            file.seek(SeekFrom::Start(current))?;
            let missing = (region.total_size as u64 - current) as usize;
            file.write_all(&vec![ERASED; missing])?;
            file.flush()?;
        }

        Ok(Self { region, file })
    }
}

impl Flash for FileFlash {
    fn region(&self) -> &FlashRegion {
        &self.region
    }

    fn erase_block(&mut self, index: u32) -> Result<(), FlashError> {
        let (start, length) = self.region.block_range(index)?;
        self.file.seek(SeekFrom::Start(start as u64))?;
        self.file.write_all(&vec![ERASED; length])?;
        self.file.flush()?;
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        self.region.check(offset, data.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        self.file.flush()?;

        let mut readback = vec![0; data.len()];
        self.read(offset, &mut readback)?;
        if readback != data {
            return Err(FlashError::VerifyFailed { offset });
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.region.check(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }
}
