mod api;
mod state;
mod static_files;
mod watcher;

use axum::{
    Router,
    routing::{get, post},
};
use mini_recon::CsvCodec;
use mini_recon::session::Side;
use std::{
    net::{Ipv4Addr, SocketAddrV4},
    path::PathBuf,
};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use state::AppState;
use watcher::FileWatcher;

pub const DEFAULT_PORT: u16 = 8473;

fn router(state: AppState) -> Router {
    // API routes first, then fall back to the embedded static files
    Router::new()
        .route("/api/state", get(api::get_state))
        .route(
            "/api/file/{side}",
            post(api::upload_file).delete(api::clear_file),
        )
        .route("/api/reconcile", post(api::reconcile))
        .route("/api/export/{bucket}", get(api::export))
        .route("/api/events", get(api::file_changes_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .fallback(static_files::static_handler)
}

/// Serve the reconciliation UI. Files passed here are loaded up front and
/// reloaded whenever they change on disk.
pub async fn run(
    internal: Option<PathBuf>,
    provider: Option<PathBuf>,
    codec: CsvCodec,
    port: u16,
) -> anyhow::Result<()> {
    // Initialize tracing if not already initialized
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_recon_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    let watched: Vec<(Side, PathBuf)> = [(Side::Internal, internal), (Side::Provider, provider)]
        .into_iter()
        .filter_map(|(side, path)| path.map(|path| (side, path)))
        .collect();
    let files: Vec<PathBuf> = watched.iter().map(|(_, path)| path.clone()).collect();

    let (file_change_tx, _) = broadcast::channel(16);
    let state = AppState::new(codec, watched, file_change_tx);

    let _watcher = if files.is_empty() {
        None
    } else {
        let watcher_state = state.clone();
        Some(FileWatcher::new(&files, move |changed| {
            watcher_state.reload(changed)
        })?)
    };

    let app = router(state);

    let listen = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("Server listening on http://{}", listen);

    axum::serve(listener, app).await?;

    Ok(())
}
