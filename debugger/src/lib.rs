//! Debugger side of an xsbug session.
//!
//! [`Controller`] decides which commands to send in reaction to engine
//! messages; [`client`] connects it to a device; [`drive`] pumps decoded
//! documents through it.
mod breakpoint;
pub mod client;
mod controller;
mod session;

pub use breakpoint::parse_breakpoint;
pub use controller::{CommandSink, Controller, ControllerConfig, Policy};
pub use session::drive;
