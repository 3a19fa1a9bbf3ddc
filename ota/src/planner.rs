//! Erase planning for flash writes.

use std::ops::Range;

use crate::error::FlashError;

/// The erase-unit indices to clear before writing `erase_length` bytes.
///
/// Indices run from zero, strictly increasing, one per block touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasePlan {
    blocks: Range<u32>,
}

impl ErasePlan {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> Range<u32> {
        self.blocks.clone()
    }
}

impl IntoIterator for ErasePlan {
    type Item = u32;
    type IntoIter = Range<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks
    }
}

impl IntoIterator for &ErasePlan {
    type Item = u32;
    type IntoIter = Range<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks()
    }
}

/// Compute the minimal erase plan covering `erase_length` bytes.
pub fn erase_plan(erase_length: u32, block_size: u32) -> Result<ErasePlan, FlashError> {
    if block_size == 0 {
        return Err(FlashError::ZeroBlockSize);
    }
    Ok(ErasePlan {
        blocks: 0..erase_length.div_ceil(block_size),
    })
}
