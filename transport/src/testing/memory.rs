//! In-memory transport for testing.

use tokio::io::{duplex, DuplexStream};

use crate::transport::XsbugTransport;

/// A connected in-memory byte channel.
///
/// Bytes written on one side of a [`MemoryTransport::pair`] are read on the
/// other, so a debugger-side [`split`](crate::split) can talk to an engine
/// side framed with [`EngineCodec`](crate::EngineCodec).
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected pair with a 64KB buffer in each direction.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    /// Create a connected pair with `buffer_size` bytes of buffering in each
    /// direction. Writers wait once their buffer is full.
    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_write, a_to_b_read) = duplex(buffer_size);
        let (b_to_a_write, b_to_a_read) = duplex(buffer_size);

        let transport_a = MemoryTransport {
            read: b_to_a_read,
            write: a_to_b_write,
        };
        let transport_b = MemoryTransport {
            read: a_to_b_read,
            write: b_to_a_write,
        };
        (transport_a, transport_b)
    }
}

impl XsbugTransport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (self.read, self.write)
    }
}
