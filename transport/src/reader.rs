//! Typed stream of inbound xsbug documents.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use crate::codec::ClientCodec;
use crate::error::CodecError;
use crate::message::DebugMessage;

pin_project! {
    /// An async stream of decoded `<xsbug>` documents.
    ///
    /// Each item holds every message of one document, in document order. A
    /// document that fails to decode yields an error item and the stream
    /// carries on with the next one.
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut reader = DocumentReader::new(read_half);
    /// while let Some(messages) = reader.next().await {
    ///     for message in messages? {
    ///         controller.handle(message)?;
    ///     }
    /// }
    /// ```
    pub struct DocumentReader<R> {
        #[pin]
        inner: FramedRead<R, Documents>,
    }
}

/// Passes decode failures through as items. `FramedRead` pauses after a
/// decoder error, which would drop documents already buffered behind it.
#[derive(Debug)]
struct Documents(ClientCodec);

impl Decoder for Documents {
    type Item = Result<Vec<DebugMessage>, CodecError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.0.decode(src) {
            Err(CodecError::Decode(e)) => Ok(Some(Err(e.into()))),
            other => other.map(|frame| frame.map(Ok)),
        }
    }
}

impl<R> DocumentReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a reader with the default codec (1 MB document limit).
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, ClientCodec::new())
    }

    /// Create a reader with a custom codec, e.g. a different size limit.
    pub fn with_codec(reader: R, codec: ClientCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, Documents(codec)),
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// Consume the document reader and return the underlying reader.
    ///
    /// Bytes already buffered but not yet decoded are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for DocumentReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Vec<DebugMessage>, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .inner
            .poll_next(cx)
            .map(|item| item.map(|framed| framed.and_then(|document| document)))
    }
}
