//! xsbug framing codecs using tokio-util.
//!
//! The protocol is asymmetric, so there is one codec per side:
//!
//! - [`ClientCodec`] writes commands and reads `<xsbug>` documents
//! - [`EngineCodec`] reads commands and writes documents
//!
//! Commands are framed by CRLF on both sides:
//! ```text
//! \r\n<set-breakpoint path="main.js" line="3"/>\r\n
//! ```
//! Documents are framed by their root element: a frame ends where the first
//! top-level element closes, whatever its name, so a document with the wrong
//! root still surfaces as its own decode error. Whitespace between documents
//! is skipped.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::command::{Command, CRLF};
use crate::decode::decode_document;
use crate::error::{CodecError, DecodeError};
use crate::message::DebugMessage;

/// Default maximum buffered frame size (1 MB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Debugger-side codec: encodes [`Command`]s, decodes documents.
#[derive(Debug, Clone)]
pub struct ClientCodec {
    max_message_size: usize,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Create a codec that rejects documents larger than `max_message_size`.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = Vec<DebugMessage>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        skip_whitespace(src);
        if src.is_empty() {
            return Ok(None);
        }

        let Some(end) = element_end(src) else {
            check_size(src.len(), self.max_message_size)?;
            return Ok(None);
        };
        check_size(end, self.max_message_size)?;

        // consume before decoding so a bad document does not wedge the stream
        let frame = src.split_to(end);
        let text = std::str::from_utf8(&frame).map_err(|_| DecodeError::InvalidUtf8)?;
        tracing::trace!(length = frame.len(), "decoding document");
        Ok(Some(decode_document(text)?))
    }
}

impl Encoder<Command> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.encode();
        dst.reserve(text.len());
        dst.put_slice(text.as_bytes());
        Ok(())
    }
}

/// Engine-side codec: decodes [`Command`]s, encodes documents.
#[derive(Debug, Clone)]
pub struct EngineCodec {
    max_message_size: usize,
}

impl EngineCodec {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for EngineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EngineCodec {
    type Item = Command;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        skip_whitespace(src);
        let Some(end) = find(src, CRLF.as_bytes()) else {
            check_size(src.len(), self.max_message_size)?;
            return Ok(None);
        };
        check_size(end, self.max_message_size)?;

        let frame = src.split_to(end);
        src.advance(CRLF.len());
        let text = std::str::from_utf8(&frame).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(Some(Command::parse(text)?))
    }
}

impl Encoder<String> for EngineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 2 * CRLF.len());
        dst.put_slice(CRLF.as_bytes());
        dst.put_slice(item.as_bytes());
        dst.put_slice(CRLF.as_bytes());
        Ok(())
    }
}

fn skip_whitespace(src: &mut BytesMut) {
    let n = src.iter().take_while(|b| b.is_ascii_whitespace()).count();
    src.advance(n);
}

/// Find the end of the first complete top-level element in `src`.
///
/// Returns `None` while that element is still open. Comments, CDATA sections,
/// declarations and processing instructions are stepped over; a stray close tag at the top
/// level ends the frame so the parser can reject it.
fn element_end(src: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = 0;
    loop {
        let open = pos + src[pos..].iter().position(|&b| b == b'<')?;
        let rest = &src[open..];

        if rest.starts_with(b"<!--") {
            pos = open + find(rest, b"-->")? + 3;
            continue;
        }
        if rest.starts_with(b"<![CDATA[") {
            pos = open + find(rest, b"]]>")? + 3;
            continue;
        }
        if rest.starts_with(b"<?") {
            pos = open + find(rest, b"?>")? + 2;
            continue;
        }
        if rest.starts_with(b"<!") {
            pos = open + tag_end(rest)? + 1;
            continue;
        }

        let close = open + tag_end(rest)?;
        pos = close + 1;
        if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
        } else if !src[open..close].trim_ascii_end().ends_with(b"/") {
            depth += 1;
        }

        if depth == 0 {
            return Some(pos);
        }
    }
}

/// Offset of the `>` closing the tag at the start of `tag`, skipping quoted
/// attribute values.
fn tag_end(tag: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (i, &b) in tag.iter().enumerate().skip(1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn check_size(size: usize, max: usize) -> Result<(), CodecError> {
    if size > max {
        return Err(CodecError::MessageTooLarge { size, max });
    }
    Ok(())
}
