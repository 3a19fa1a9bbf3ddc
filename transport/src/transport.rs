//! Transport abstraction and split functionality.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::reader::DocumentReader;
use crate::writer::CommandWriter;

/// A byte transport that can be split into read and write halves.
///
/// Implemented for TCP streams and for the in-memory test transport.
pub trait XsbugTransport: Send + 'static {
    type Read: AsyncRead + Unpin + Send + 'static;
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split into independently owned read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl XsbugTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a debugger-side document reader and command writer.
pub fn split<T: XsbugTransport>(
    transport: T,
) -> (DocumentReader<T::Read>, CommandWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (DocumentReader::new(read), CommandWriter::new(write))
}
