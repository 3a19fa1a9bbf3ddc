//! HTTP front for the `/mod` control routes.
//!
//! Every handled request answers `200` with permissive CORS headers and a
//! `done` body; failures answer `500` with the same headers and the error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use eyre::WrapErr;
use futures::StreamExt;
use ota::{ConfigEntry, Flash, InstallSession, Installer, Preferences, Restart, Route};

pub type DeviceInstaller = Installer<Box<dyn Flash + Send>, Box<dyn Restart + Send>>;

pub type DevicePreferences = Box<dyn Preferences + Send>;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    installer: Arc<Mutex<DeviceInstaller>>,
    preferences: Arc<Mutex<DevicePreferences>>,
}

impl AppState {
    pub fn new(installer: DeviceInstaller, preferences: DevicePreferences) -> Self {
        Self {
            installer: Arc::new(Mutex::new(installer)),
            preferences: Arc::new(Mutex::new(preferences)),
        }
    }

    /// Lock the installer. Guards must not be held across an `.await`.
    pub fn installer(&self) -> MutexGuard<'_, DeviceInstaller> {
        self.installer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn preferences(&self) -> MutexGuard<'_, DevicePreferences> {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let route = Route::parse(request.uri().path());
    tracing::debug!(method = %request.method(), path = %request.uri().path(), ?route, "request");

    let result = match route {
        Route::Unknown => return StatusCode::NOT_FOUND.into_response(),
        _ if request.method() == Method::OPTIONS => Ok(()),
        Route::Install => install(&state, request).await,
        Route::Uninstall => uninstall(&state),
        Route::Config(entry) => configure(&state, entry),
    };

    match result {
        Ok(()) => (cors(), "done\n").into_response(),
        Err(e) => {
            tracing::warn!("request failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                cors(),
                format!("{e:#}\n"),
            )
                .into_response()
        }
    }
}

fn cors() -> [(HeaderName, &'static str); 2] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, PUT"),
    ]
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// An install session tied to its request. Dropped before the body is
/// complete, it aborts the session, which covers both failed reads and
/// clients that disconnect mid-upload.
struct ActiveInstall<'a> {
    state: &'a AppState,
    session: InstallSession,
    complete: bool,
}

impl<'a> ActiveInstall<'a> {
    fn begin(state: &'a AppState) -> Self {
        let session = state.installer().begin_install();
        Self {
            state,
            session,
            complete: false,
        }
    }

    fn finish(mut self) {
        self.state.installer().body_complete(&mut self.session);
        self.complete = true;
    }
}

impl Drop for ActiveInstall<'_> {
    fn drop(&mut self) {
        if !self.complete {
            self.state.installer().abort(&self.session);
        }
    }
}

#[tracing::instrument(skip_all)]
async fn install(state: &AppState, request: Request) -> eyre::Result<()> {
    let length = content_length(request.headers());
    let mut active = ActiveInstall::begin(state);

    match length {
        Some(length) => state.installer().content_length(&mut active.session, length)?,
        None => tracing::debug!("install request without content length"),
    }

    let mut body = request.into_body().into_data_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.wrap_err("reading install body")?;
        state.installer().write_fragment(&mut active.session, &chunk)?;
    }

    active.finish();
    Ok(())
}

fn uninstall(state: &AppState) -> eyre::Result<()> {
    state.installer().uninstall()?;
    Ok(())
}

fn configure(state: &AppState, entry: Option<ConfigEntry>) -> eyre::Result<()> {
    match entry {
        Some(entry) => entry.store(&mut *state.preferences())?,
        None => tracing::debug!("malformed config path ignored"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::Duration;
    use ota::{
        FlashRegion, InstallConfig, InstallState, MemoryFlash, MemoryPreferences,
        RecordingRestart, CONFIG_DOMAIN, ERASED, SIGNATURE_LENGTH,
    };
    use tower::ServiceExt;

    fn state() -> AppState {
        let flash = MemoryFlash::new(FlashRegion::new("xs_stage", 64, 256));
        let installer = Installer::new(
            Box::new(flash) as Box<dyn Flash + Send>,
            Box::new(RecordingRestart::default()) as Box<dyn Restart + Send>,
            InstallConfig::default(),
        );
        AppState::new(installer, Box::new(MemoryPreferences::default()))
    }

    async fn send(state: &AppState, request: axum::http::Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn read(state: &AppState, offset: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        state.installer().flash_mut().read(offset, &mut buf).unwrap();
        buf
    }

    #[tokio::test]
    async fn install_writes_body() {
        let state = state();
        let payload = b"mod archive bytes".to_vec();
        let request = axum::http::Request::put("/mod/install")
            .header(header::CONTENT_LENGTH, payload.len())
            .body(Body::from(payload.clone()))
            .unwrap();

        let (status, headers, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, PUT");
        assert_eq!(read(&state, 0, payload.len()), payload);
        assert_eq!(state.installer().state(), InstallState::Complete);
        assert!(state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn install_without_length_drops_body() {
        let state = state();
        let request = axum::http::Request::put("/mod/install")
            .body(Body::from_stream(futures::stream::iter(vec![
                Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"abc")),
            ])))
            .unwrap();

        let (status, _, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(read(&state, 0, 3), [ERASED; 3]);
        assert_eq!(state.installer().state(), InstallState::Idle);
        assert!(!state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn oversized_install_fails() {
        let state = state();
        let request = axum::http::Request::put("/mod/install")
            .header(header::CONTENT_LENGTH, 1024)
            .body(Body::from(vec![1u8; 1024]))
            .unwrap();

        let (status, headers, _) = send(&state, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(state.installer().state(), InstallState::Idle);
        assert!(!state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn body_error_aborts_install() {
        let state = state();
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"abc")),
            Err(std::io::Error::other("connection reset")),
        ];
        let request = axum::http::Request::put("/mod/install")
            .header(header::CONTENT_LENGTH, 10)
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();

        let (status, headers, _) = send(&state, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(state.installer().state(), InstallState::Idle);
        assert!(!state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn dropped_request_aborts_install() {
        let state = state();
        let body = futures::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from_static(b"abc"),
        )])
        .chain(futures::stream::pending());
        let request = axum::http::Request::put("/mod/install")
            .header(header::CONTENT_LENGTH, 10)
            .body(Body::from_stream(body))
            .unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), send(&state, request)).await;

        assert!(pending.is_err());
        assert_eq!(read(&state, 0, 3), b"abc");
        assert_eq!(state.installer().state(), InstallState::Idle);
        assert!(!state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn uninstall_clears_signature() {
        let state = state();
        let (status, _, body) = send(&state, get("/mod/uninstall")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(read(&state, 0, SIGNATURE_LENGTH), [0; SIGNATURE_LENGTH]);
        assert_eq!(state.installer().state(), InstallState::Uninstalling);
        assert!(state.installer().restart_scheduled());
    }

    #[tokio::test]
    async fn config_stores_preference() {
        let state = state();
        let (status, _, body) = send(&state, get("/mod/config/debug/1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(
            state.preferences().get(CONFIG_DOMAIN, "debug").as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn malformed_config_is_ignored() {
        let state = state();
        let (status, _, body) = send(&state, get("/mod/config/debug")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(state.preferences().get(CONFIG_DOMAIN, "debug"), None);
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let state = state();
        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/mod/install")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "done\n");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, PUT");
        assert_eq!(state.installer().state(), InstallState::Idle);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let state = state();
        let (status, _, _) = send(&state, get("/index.html")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
