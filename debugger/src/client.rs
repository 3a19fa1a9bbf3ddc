//! Connections from the debugger to a running engine.
//!
//! Devices expose the engine over a WebSocket negotiated with the `x-xsbug`
//! subprotocol. A plain TCP connection is also accepted with a `tcp://` URL.

use bytes::BytesMut;
use eyre::WrapErr;
use futures::stream::BoxStream;
use futures::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::codec::Decoder;
use transport::{ClientCodec, Command, DebugMessage, PROTOCOL};

/// Decoded documents from the engine, in arrival order.
pub type Documents = BoxStream<'static, eyre::Result<Vec<DebugMessage>>>;

/// Connect to `url` and return a command sender and the document stream.
///
/// Commands queued on the sender are written by a background task that
/// ends when the sender is dropped.
pub async fn connect(url: &str) -> eyre::Result<(mpsc::UnboundedSender<Command>, Documents)> {
    match url.strip_prefix("tcp://") {
        Some(addr) => connect_tcp(addr).await,
        None => connect_websocket(url).await,
    }
}

#[tracing::instrument]
pub async fn connect_websocket(
    url: &str,
) -> eyre::Result<(mpsc::UnboundedSender<Command>, Documents)> {
    let mut request = url
        .into_client_request()
        .wrap_err("building websocket request")?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(PROTOCOL));

    let (socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .wrap_err_with(|| format!("connecting to {url}"))?;
    let negotiated = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok());
    if negotiated != Some(PROTOCOL) {
        eyre::bail!("engine did not accept subprotocol {PROTOCOL} (got {negotiated:?})");
    }
    tracing::info!("connected");

    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(e) = sink.send(Message::text(command.encode())).await {
                tracing::warn!(error = %e, "sending command failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    Ok((tx, websocket_documents(stream).boxed()))
}

#[tracing::instrument]
pub async fn connect_tcp(addr: &str) -> eyre::Result<(mpsc::UnboundedSender<Command>, Documents)> {
    let (reader, mut writer) = transport::connect(addr)
        .await
        .wrap_err_with(|| format!("connecting to {addr}"))?;
    tracing::info!("connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            if let Err(e) = writer.send(command).await {
                tracing::warn!(error = %e, "sending command failed");
                break;
            }
        }
    });

    Ok((tx, reader.map(|r| r.map_err(eyre::Report::from)).boxed()))
}

/// Reassemble documents from WebSocket messages.
///
/// A document may span several messages, and one message may hold several
/// documents, so the payloads go through the same framing codec as a raw
/// byte stream.
pub fn websocket_documents<St>(
    messages: St,
) -> impl Stream<Item = eyre::Result<Vec<DebugMessage>>> + Send + 'static
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
{
    let state = (messages, BytesMut::new(), ClientCodec::new());
    futures::stream::unfold(state, |(mut messages, mut buffer, mut codec)| async move {
        loop {
            match codec.decode(&mut buffer) {
                Ok(Some(document)) => return Some((Ok(document), (messages, buffer, codec))),
                Ok(None) => {}
                Err(e) => return Some((Err(eyre::Report::from(e)), (messages, buffer, codec))),
            }

            match messages.next().await? {
                Ok(Message::Text(text)) => buffer.extend_from_slice(text.as_str().as_bytes()),
                Ok(Message::Binary(data)) => buffer.extend_from_slice(&data),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "engine closed the connection");
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    return Some((
                        Err(eyre::Report::new(e).wrap_err("reading websocket")),
                        (messages, buffer, codec),
                    ))
                }
            }
        }
    })
}
