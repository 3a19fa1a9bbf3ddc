//! Debugger WebSocket listener.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use eyre::WrapErr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use transport::PROTOCOL;

use crate::negotiator::{AttachHook, DebugEngine, Negotiator};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the WebSocket handshake on `stream` and attach it to `engine` if the
/// client asked for the debug subprotocol.
///
/// Returns whether the engine is connected. Clients that do not offer the
/// subprotocol get `400 Bad Request`.
pub async fn accept<S, E>(stream: S, mut negotiator: Negotiator, engine: &mut E) -> eyre::Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: DebugEngine<WebSocketStream<S>>,
{
    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        let offered = request
            .headers()
            .get_all(SEC_WEBSOCKET_PROTOCOL)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");

        match negotiator.select_subprotocol(&offered) {
            Some(protocol) => {
                response
                    .headers_mut()
                    .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(protocol));
                Ok(response)
            }
            None => {
                let mut rejection =
                    ErrorResponse::new(Some(format!("subprotocol {PROTOCOL} required\n")));
                *rejection.status_mut() = StatusCode::BAD_REQUEST;
                Err(rejection)
            }
        }
    };

    let socket = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .wrap_err("websocket handshake")?;

    match negotiator.handshake_complete(socket, engine) {
        Ok(attached) => Ok(attached.connected()),
        Err(_) => eyre::bail!("handshake completed without a subprotocol"),
    }
}

/// Accepts debugger connections one at a time on the debug port.
pub struct DebugListener<E> {
    listener: TcpListener,
    engine: E,
    on_attach: Option<AttachHook>,
}

impl<E> DebugListener<E>
where
    E: DebugEngine<WebSocketStream<TcpStream>>,
{
    pub fn new(listener: TcpListener, engine: E) -> Self {
        Self {
            listener,
            engine,
            on_attach: None,
        }
    }

    pub fn on_attach(mut self, hook: AttachHook) -> Self {
        self.on_attach = Some(hook);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) -> eyre::Result<()> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.engine.disconnect();
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    accepted.wrap_err("accepting debugger connection")?
                }
            };
            tracing::debug!(%peer, "debugger connection");

            let mut negotiator = Negotiator::new();
            if let Some(hook) = &self.on_attach {
                negotiator = negotiator.on_attach(hook.clone());
            }

            let attempt = accept(stream, negotiator, &mut self.engine);
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, attempt).await {
                Ok(Ok(connected)) => tracing::info!(%peer, connected, "debugger attached"),
                Ok(Err(e)) => tracing::warn!(%peer, "debugger rejected: {e:#}"),
                Err(_) => tracing::warn!(%peer, "debugger handshake timed out"),
            }
        }
    }
}
