//! The device host: HTTP control routes and the debugger port.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::WrapErr;
use ota::{FileFlash, FilePreferences, Flash, Installer, MemoryFlash, MemoryPreferences, Restart};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::discovery::{self, LogAdvertiser};
use crate::engine::HostEngine;
use crate::http::{self, AppState, DevicePreferences};
use crate::payload;
use crate::restart::TokioRestart;
use crate::settings::Settings;
use crate::ws::DebugListener;

/// A bound host, ready to serve.
pub struct Host {
    settings: Settings,
    http: TcpListener,
    debug: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
}

impl Host {
    /// Open storage and bind both listeners.
    #[tracing::instrument(skip_all, fields(hostname = %settings.hostname))]
    pub async fn bind(settings: Settings) -> eyre::Result<Self> {
        let shutdown = CancellationToken::new();

        let flash = open_flash(&settings)?;
        let preferences = open_preferences(&settings)?;
        let restart: Box<dyn Restart + Send> = Box::new(TokioRestart::new(shutdown.clone()));
        let installer = Installer::new(flash, restart, settings.install.clone());
        let state = AppState::new(installer, preferences);

        let http = TcpListener::bind(settings.http_addr)
            .await
            .wrap_err_with(|| format!("binding http listener on {}", settings.http_addr))?;
        let debug = TcpListener::bind(settings.debug_addr)
            .await
            .wrap_err_with(|| format!("binding debug listener on {}", settings.debug_addr))?;

        Ok(Self {
            settings,
            http,
            debug,
            state,
            shutdown,
        })
    }

    pub fn http_addr(&self) -> io::Result<SocketAddr> {
        self.http.local_addr()
    }

    pub fn debug_addr(&self) -> io::Result<SocketAddr> {
        self.debug.local_addr()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Cancelled when the host should stop, either on request or because a
    /// restart fell due.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn run(self) -> eyre::Result<()> {
        let Self {
            settings,
            http: http_listener,
            debug,
            state,
            shutdown,
        } = self;

        let port = http_listener.local_addr()?.port();
        discovery::start(&mut LogAdvertiser::default(), &settings.hostname, port);

        let loaded = Arc::new(AtomicBool::new(false));
        let mut listener = DebugListener::new(debug, HostEngine::new(&settings.hostname));
        if settings.load_on_attach {
            tracing::info!("mod loads when a debugger attaches");
            let state = state.clone();
            let loaded = loaded.clone();
            listener = listener.on_attach(Arc::new(move || load_once(&state, &loaded)));
        } else {
            load_once(&state, &loaded);
        }
        let debugger = tokio::spawn(listener.run(shutdown.clone()));

        let signal = shutdown.clone();
        axum::serve(http_listener, http::router(state))
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .wrap_err("serving http")?;

        shutdown.cancel();
        debugger.await.wrap_err("debug listener panicked")??;
        Ok(())
    }
}

fn load_once(state: &AppState, loaded: &AtomicBool) {
    if loaded.swap(true, Ordering::SeqCst) {
        return;
    }
    payload::load(state.installer().flash_mut());
}

fn open_flash(settings: &Settings) -> eyre::Result<Box<dyn Flash + Send>> {
    let region = settings.region.clone();
    match &settings.flash {
        Some(path) => {
            let flash = FileFlash::open(path, region)
                .wrap_err_with(|| format!("opening flash file {}", path.display()))?;
            Ok(Box::new(flash))
        }
        None => {
            tracing::warn!("no flash file configured, installs will not survive a restart");
            Ok(Box::new(MemoryFlash::new(region)))
        }
    }
}

fn open_preferences(settings: &Settings) -> eyre::Result<DevicePreferences> {
    let path = settings.preferences.clone().or_else(ota::default_path);
    match path {
        Some(path) => {
            let preferences = FilePreferences::open(&path)
                .wrap_err_with(|| format!("opening preferences {}", path.display()))?;
            Ok(Box::new(preferences))
        }
        None => Ok(Box::new(MemoryPreferences::default())),
    }
}
