//! Typed sink for outbound debugger commands.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::ClientCodec;
use crate::command::Command;
use crate::error::CodecError;

pin_project! {
    /// An async sink for [`Command`]s, framed with CRLF on both sides.
    ///
    /// Besides the [`Sink`] implementation there is an inherent
    /// [`send`](CommandWriter::send) for the common one-command case.
    ///
    /// ```ignore
    /// let mut writer = CommandWriter::new(write_half);
    /// writer.send(Command::set_all_breakpoints(breakpoints, true, false)).await?;
    /// writer.send(Command::Go).await?;
    /// ```
    pub struct CommandWriter<W> {
        #[pin]
        inner: FramedWrite<W, ClientCodec>,
    }
}

impl<W> CommandWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a command writer over an async write destination.
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, ClientCodec::new()),
        }
    }

    /// Feed, flush and await a single command.
    pub async fn send(&mut self, command: Command) -> Result<(), CodecError> {
        use futures::SinkExt;
        tracing::debug!(command = command.tag(), "sending command");
        SinkExt::send(&mut self.inner, command).await
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }

    /// Consume the command writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W> Sink<Command> for CommandWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Command) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}
