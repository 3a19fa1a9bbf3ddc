use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ota::{FlashRegion, InstallConfig, STAGE_PARTITION};
use server::{Host, Settings, DEFAULT_BLOCK_SIZE, DEFAULT_HOSTNAME, DEFAULT_PARTITION_SIZE};
use tracing_subscriber::EnvFilter;
use transport::DEFAULT_DEBUG_PORT;

/// Serve payload installs and debugger connections for a device.
#[derive(Debug, Parser)]
struct Args {
    /// Address for the `/mod` control routes
    #[clap(long, env = "RUNMOD_HTTP_ADDR", default_value = "0.0.0.0:80")]
    http_addr: SocketAddr,

    /// Port for debugger WebSocket connections
    #[clap(long, env = "RUNMOD_DEBUG_PORT", default_value_t = DEFAULT_DEBUG_PORT)]
    debug_port: u16,

    /// File backing the flash partition
    #[clap(long, env = "RUNMOD_FLASH")]
    flash: Option<PathBuf>,

    #[clap(long, default_value = STAGE_PARTITION)]
    partition: String,

    /// Erase block size in bytes
    #[clap(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,

    /// Partition size in bytes
    #[clap(long, default_value_t = DEFAULT_PARTITION_SIZE)]
    partition_size: u32,

    /// Preference file [default: user data directory]
    #[clap(long, env = "RUNMOD_PREFERENCES")]
    preferences: Option<PathBuf>,

    /// Name advertised on the local network
    #[clap(long, default_value = DEFAULT_HOSTNAME)]
    hostname: String,

    #[clap(long, default_value_t = 5000)]
    restart_delay_ms: u64,

    /// Load the installed mod only once a debugger attaches
    #[clap(long)]
    load_on_attach: bool,

    /// Discard an install still waiting for its content length after this long
    #[clap(long)]
    install_timeout_secs: Option<u64>,
}

impl Args {
    fn settings(self) -> Settings {
        Settings {
            http_addr: self.http_addr,
            debug_addr: SocketAddr::new(self.http_addr.ip(), self.debug_port),
            flash: self.flash,
            region: FlashRegion::new(self.partition, self.block_size, self.partition_size),
            preferences: self.preferences,
            hostname: self.hostname,
            install: InstallConfig {
                restart_delay: Duration::from_millis(self.restart_delay_ms),
                stale_after: self.install_timeout_secs.map(Duration::from_secs),
            },
            load_on_attach: self.load_on_attach,
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if std::io::stderr().is_terminal() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .json()
            .init();
    }
    color_eyre::install()?;

    let args = Args::parse();
    tracing::debug!(?args, "parsed command line arguments");
    let settings = args.settings();

    // a restart tears the host down and boots it again from storage
    loop {
        let host = Host::bind(settings.clone()).await?;
        let shutdown = host.shutdown_token();
        tokio::select! {
            result = host.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                shutdown.cancel();
                return Ok(());
            }
        }
    }
}
