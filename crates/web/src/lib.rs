//! Local web editor for the gate configuration document.
//!
//! Serves a single settings page that reads the JSON document, lets the
//! operator edit the token, channels, messages and button labels, and writes
//! the document back. The running bot only picks up changes on restart.

mod editor;
pub mod error;
pub mod form;
mod templates;

use std::{future::Future, net::SocketAddr, path::PathBuf, sync::Arc};

use {
    axum::{Router, routing::get},
    tokio::{net::TcpListener, sync::Mutex},
    tracing::info,
};

pub use error::{Error, Result};

/// Address the editor binds to unless told otherwise.
pub const DEFAULT_BIND: &str = "127.0.0.1:5001";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    /// Serializes read-modify-write cycles on the document.
    save_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    fn display_path(&self) -> String {
        self.config_path.display().to_string()
    }
}

/// Build the editor router.
pub fn editor_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(editor::show_handler).post(editor::save_handler))
        .route("/health", get(editor::health_handler))
        .with_state(state)
}

/// Serve the editor on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    config_path: PathBuf,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, config_path, shutdown).await
}

/// Serve the editor on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    config_path: PathBuf,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    info!(addr = %local, config = %config_path.display(), "config editor listening");
    let app = editor_routes(AppState::new(config_path));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("config editor stopped");
    Ok(())
}
