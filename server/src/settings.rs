use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use ota::{FlashRegion, InstallConfig, STAGE_PARTITION};
use transport::DEFAULT_DEBUG_PORT;

pub const DEFAULT_HOSTNAME: &str = "runmod";
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
pub const DEFAULT_PARTITION_SIZE: u32 = 1024 * 1024;

/// Host configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http_addr: SocketAddr,
    pub debug_addr: SocketAddr,
    /// File backing the flash region; kept in memory when unset.
    pub flash: Option<PathBuf>,
    pub region: FlashRegion,
    /// Preference file; kept in memory when unset.
    pub preferences: Option<PathBuf>,
    pub hostname: String,
    pub install: InstallConfig,
    /// Defer loading the payload until a debugger attaches.
    pub load_on_attach: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 80)),
            debug_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_DEBUG_PORT)),
            flash: None,
            region: FlashRegion::new(STAGE_PARTITION, DEFAULT_BLOCK_SIZE, DEFAULT_PARTITION_SIZE),
            preferences: None,
            hostname: DEFAULT_HOSTNAME.to_owned(),
            install: InstallConfig::default(),
            load_on_attach: false,
        }
    }
}
