//! Over-the-air installation of a payload into a flash partition.
//!
//! An install arrives as one HTTP request: the request path arms a session,
//! the `content-length` header sizes the erase, and each body fragment is
//! written at the running position. Completion, or an uninstall, schedules a
//! delayed restart.
//!
//! The state machine is transport-agnostic; the `server` crate feeds it
//! from axum.

mod error;
mod flash;
mod installer;
mod planner;
mod preferences;
mod restart;
mod route;

pub use error::{FlashError, InstallError, PreferenceError};
pub use flash::{FileFlash, Flash, FlashOp, FlashRegion, MemoryFlash, ERASED};
pub use installer::{FragmentOutcome, InstallConfig, InstallSession, InstallState, Installer};
pub use planner::{erase_plan, ErasePlan};
pub use preferences::{default_path, FilePreferences, MemoryPreferences, Preferences, Store};
pub use restart::{RecordingRestart, Restart};
pub use route::{ConfigEntry, Route};

use std::time::Duration;

/// Partition that receives installed payloads.
pub const STAGE_PARTITION: &str = "xs_stage";

/// Preference domain for `/mod/config` pairs.
pub const CONFIG_DOMAIN: &str = "config";

/// Delay between a completed install or uninstall and the restart.
pub const RESTART_DELAY: Duration = Duration::from_millis(5000);

/// Bytes at the start of the partition holding the payload signature.
/// Zeroing them marks the partition as empty.
pub const SIGNATURE_LENGTH: usize = 16;
