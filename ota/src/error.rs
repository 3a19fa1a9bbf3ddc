use std::io;

/// Errors from a flash region or its backend.
#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("access of {length} bytes at offset {offset} is outside a region of {size} bytes")]
    OutOfBounds { offset: u32, length: usize, size: u32 },

    /// Block size of zero; a programming error in the region definition.
    #[error("flash block size must be non-zero")]
    ZeroBlockSize,

    /// Read-back after a write did not match what was written.
    #[error("verification failed after write at offset {offset}")]
    VerifyFailed { offset: u32 },

    #[error("flash I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that abort an install session.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// A fragment would write past the erased range.
    #[error(
        "fragment of {length} bytes at position {position} overflows erase length {erase_length}"
    )]
    WriteOverflow {
        position: u32,
        length: usize,
        erase_length: u32,
    },

    /// The announced content length does not fit in the region.
    #[error("content length {length} exceeds region capacity {capacity}")]
    ContentTooLarge { length: u64, capacity: u32 },

    #[error(transparent)]
    Flash(#[from] FlashError),
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("preference store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("preference store is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}
