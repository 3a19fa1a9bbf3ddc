//! xsbug debug wire protocol.
//!
//! The debugger sends CRLF-framed XML commands to a running engine and
//! receives `<xsbug>` documents back, each carrying one or more messages
//! (login, break, frames, variables, log output, instrument samples).
//!
//! # Architecture
//!
//! - [`Command`] encodes outbound commands and parses them back on the engine side
//! - [`decode_document`] turns a document into [`DebugMessage`]s, including the
//!   sorted [`Property`] trees of the remote object model
//! - [`ClientCodec`] and [`EngineCodec`] frame both directions on a byte stream
//! - [`DocumentReader`] and [`CommandWriter`] wrap split stream halves
//!
//! Session policy (what to send in reaction to a message) lives in the
//! `debugger` crate.

mod codec;
mod command;
mod decode;
mod error;
mod message;
mod reader;
mod transport;
mod writer;

pub mod testing;

pub use codec::{ClientCodec, EngineCodec};
pub use command::{Breakpoint, Command, Escaped, CRLF, EXCEPTIONS_PATH, START_PATH};
pub use decode::{decode_document, CONTAINER};
pub use error::{CodecError, DecodeError};
pub use message::{
    locale_cmp, sort_properties, Break, DebugMessage, Flags, Frame, Instrument, Local, Location,
    Login, Property,
};
pub use reader::DocumentReader;
pub use transport::{split, XsbugTransport};
pub use writer::CommandWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// WebSocket subprotocol identifier for debug sessions.
pub const PROTOCOL: &str = "x-xsbug";

/// Port the device listens on for debugger connections.
pub const DEFAULT_DEBUG_PORT: u16 = 8080;

/// Connect to an engine speaking xsbug over plain TCP.
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    DocumentReader<tokio::net::tcp::OwnedReadHalf>,
    CommandWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    Ok(split(stream))
}
