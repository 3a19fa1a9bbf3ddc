//! Engine side of the debug wire protocol on a handed-off socket.
//!
//! The host has no script engine of its own. [`HostEngine`] logs in,
//! describes its instruments and then reads commands, forwarding them to an
//! optional channel.

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use transport::{Command, EngineCodec, Escaped, CRLF};

use crate::negotiator::DebugEngine;

/// Reported in the login message.
pub const ENGINE_VERSION: &str = "XS";

const INSTRUMENTS: &[(&str, &str)] = &[
    ("System bytes free", " bytes"),
    ("Network bytes read", " bytes"),
    ("Network bytes written", " bytes"),
    ("Network sockets", " sockets"),
    ("Timers", " timers"),
    ("Files", " files"),
    ("Chunk used", " / "),
    ("Chunk available", " bytes"),
    ("Slot used", " / "),
    ("Slot available", " bytes"),
    ("Stack used", " / "),
    ("Stack available", " bytes"),
    ("Garbage collections", " times"),
    ("Keys used", " keys"),
    ("Modules loaded", " modules"),
];

pub fn login_document(name: &str) -> String {
    format!(
        r#"<xsbug><login name="{}" value="{}"/></xsbug>"#,
        Escaped(name),
        ENGINE_VERSION
    )
}

pub fn instruments_document() -> String {
    let mut doc = String::from("<xsbug><instruments>");
    for (name, value) in INSTRUMENTS {
        doc.push_str(&format!(
            r#"<instrument name="{}" value="{}"/>"#,
            Escaped(name),
            Escaped(value)
        ));
    }
    doc.push_str("</instruments></xsbug>");
    doc
}

struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one debugger connection at a time.
pub struct HostEngine {
    name: String,
    commands: Option<mpsc::UnboundedSender<Command>>,
    connection: Option<Connection>,
}

impl HostEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: None,
            connection: None,
        }
    }

    /// Forward every command received from the debugger to `tx`.
    pub fn with_commands(mut self, tx: mpsc::UnboundedSender<Command>) -> Self {
        self.commands = Some(tx);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| !connection.task.is_finished())
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
    }
}

impl<T> DebugEngine<WebSocketStream<T>> for HostEngine
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn is_connected(&self) -> bool {
        HostEngine::is_connected(self)
    }

    fn disconnect(&mut self) {
        HostEngine::disconnect(self)
    }

    fn connect(&mut self, socket: WebSocketStream<T>) {
        let cancel = CancellationToken::new();
        let greeting = [login_document(&self.name), instruments_document()];
        let task = tokio::spawn(serve_connection(
            socket,
            greeting,
            self.commands.clone(),
            cancel.clone(),
        ));
        self.connection = Some(Connection { cancel, task });
    }
}

impl Drop for HostEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn serve_connection<T>(
    mut socket: WebSocketStream<T>,
    greeting: [String; 2],
    commands: Option<mpsc::UnboundedSender<Command>>,
    cancel: CancellationToken,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    for document in greeting {
        if let Err(e) = socket.send(Message::text(format!("{CRLF}{document}{CRLF}"))).await {
            tracing::warn!(error = %e, "sending greeting failed");
            return;
        }
    }

    let mut buffer = BytesMut::new();
    let mut codec = EngineCodec::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.close(None).await;
                tracing::debug!("debugger connection closed");
                return;
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => buffer.extend_from_slice(text.as_str().as_bytes()),
                Some(Ok(Message::Binary(data))) => buffer.extend_from_slice(&data),
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("debugger disconnected");
                    return;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "debugger connection failed");
                    return;
                }
            },
        }

        loop {
            match codec.decode(&mut buffer) {
                Ok(Some(command)) => {
                    tracing::debug!(command = command.tag(), "command received");
                    if let Some(tx) = &commands {
                        let _ = tx.send(command);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding malformed command");
                    buffer.clear();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use transport::{decode_document, DebugMessage, Login};

    async fn pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server, client) = tokio::io::duplex(16 * 1024);
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        (server, client)
    }

    async fn next_document(client: &mut WebSocketStream<DuplexStream>) -> Vec<DebugMessage> {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_document(text.as_str().trim()).unwrap();
                }
                Some(Ok(_)) => continue,
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[test]
    fn login_document_escapes_name() {
        assert_eq!(
            login_document("a&b"),
            r#"<xsbug><login name="a&amp;b" value="XS"/></xsbug>"#
        );
    }

    #[test]
    fn instruments_document_decodes() {
        let messages = decode_document(&instruments_document()).unwrap();
        let [DebugMessage::Instruments(instruments)] = &messages[..] else {
            panic!("expected instruments, got {messages:?}");
        };
        assert_eq!(instruments.len(), INSTRUMENTS.len());
        assert_eq!(instruments[0].name, "System bytes free");
    }

    #[tokio::test]
    async fn greets_and_forwards_commands() {
        let (server, mut client) = pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = HostEngine::new("runmod").with_commands(tx);

        assert!(engine.attach(server));
        assert_eq!(
            next_document(&mut client).await,
            vec![DebugMessage::Login(Login {
                name: "runmod".into(),
                value: ENGINE_VERSION.into(),
            })]
        );
        assert!(matches!(
            next_document(&mut client).await[..],
            [DebugMessage::Instruments(_)]
        ));

        let commands = format!("{}{}", Command::Step.encode(), Command::Go.encode());
        client.send(Message::text(commands)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Command::Step));
        assert_eq!(rx.recv().await, Some(Command::Go));
    }

    #[tokio::test]
    async fn disconnect_closes_socket() {
        let (server, mut client) = pair().await;
        let mut engine = HostEngine::new("runmod");
        engine.attach(server);
        next_document(&mut client).await;
        next_document(&mut client).await;

        engine.disconnect();
        assert!(!engine.is_connected());
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    }
}
