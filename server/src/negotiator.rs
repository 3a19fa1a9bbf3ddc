//! Hand-off of a negotiated debugger WebSocket to the engine.
//!
//! A [`Negotiator`] lives for one WebSocket handshake. It picks the `x-xsbug`
//! subprotocol when the client offers it, and once the handshake completes it
//! gives the socket to a [`DebugEngine`]. The hand-off consumes the
//! negotiator, so a socket can only ever be attached once; after that the
//! HTTP side has nothing left to deliver for the connection.

use std::sync::Arc;

use transport::PROTOCOL;

/// Action run after a socket has been attached to the engine.
pub type AttachHook = Arc<dyn Fn() + Send + Sync>;

/// The engine side of a debug session.
pub trait DebugEngine<S> {
    fn is_connected(&self) -> bool;

    fn disconnect(&mut self);

    /// Take ownership of `socket`, log in and describe instrumentation.
    fn connect(&mut self, socket: S);

    /// Replace any current debugger connection with `socket`.
    ///
    /// Returns whether the engine is connected afterwards.
    fn attach(&mut self, socket: S) -> bool {
        if self.is_connected() {
            tracing::info!("closing debugger connection");
            self.disconnect();
        }
        self.connect(socket);
        self.is_connected()
    }
}

/// Negotiation state for one incoming WebSocket.
#[derive(Default)]
pub struct Negotiator {
    selected: Option<&'static str>,
    on_attach: Option<AttachHook>,
}

impl std::fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiator")
            .field("selected", &self.selected)
            .field("on_attach", &self.on_attach.is_some())
            .finish()
    }
}

/// Terminal state: the socket belongs to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attached {
    connected: bool,
}

impl Attached {
    /// Whether the engine reported a live connection after the hand-off.
    pub fn connected(&self) -> bool {
        self.connected
    }
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_attach(mut self, hook: AttachHook) -> Self {
        self.on_attach = Some(hook);
        self
    }

    /// Choose a subprotocol from the client's comma separated offer.
    pub fn select_subprotocol(&mut self, offered: &str) -> Option<&'static str> {
        let found = offered
            .split(',')
            .map(str::trim)
            .any(|protocol| protocol == PROTOCOL);
        self.selected = found.then_some(PROTOCOL);
        tracing::debug!(offered, selected = ?self.selected, "subprotocol negotiation");
        self.selected
    }

    pub fn selected(&self) -> Option<&'static str> {
        self.selected
    }

    /// Give the socket to the engine.
    ///
    /// Without a selected subprotocol the connection is not a debug session
    /// and the socket is handed back untouched.
    pub fn handshake_complete<S, E>(self, socket: S, engine: &mut E) -> Result<Attached, S>
    where
        E: DebugEngine<S>,
    {
        if self.selected.is_none() {
            return Err(socket);
        }

        let connected = engine.attach(socket);
        tracing::info!(connected, "debugger socket attached");
        if let Some(hook) = self.on_attach {
            hook();
        }
        Ok(Attached { connected })
    }
}
