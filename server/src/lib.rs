//! Device-side host for installing and debugging payloads.
//!
//! The HTTP front ([`http`]) feeds the install state machine from the `ota`
//! crate. The debug port ([`ws`]) negotiates the `x-xsbug` WebSocket
//! subprotocol and hands the socket to the engine ([`engine`]) through a
//! [`Negotiator`].

pub mod discovery;
pub mod engine;
mod host;
pub mod http;
mod negotiator;
pub mod payload;
mod restart;
mod settings;
pub mod ws;

pub use host::Host;
pub use negotiator::{AttachHook, Attached, DebugEngine, Negotiator};
pub use restart::TokioRestart;
pub use settings::{Settings, DEFAULT_BLOCK_SIZE, DEFAULT_HOSTNAME, DEFAULT_PARTITION_SIZE};
