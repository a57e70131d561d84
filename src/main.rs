//! Doodle Party Back binary entrypoint wiring REST, SSE and the room store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use doodle_party_back::{
    config::AppConfig,
    dao::{
        room_store::{RoomStore, memory::MemoryRoomStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the room store backend: `memory`, `couch` or `mongo`.
const ROOM_STORE_ENV: &str = "ROOM_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    start_room_store(&app_state).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store right away, or hand a database backend to the supervisor
/// which keeps the service in degraded mode until the first connection succeeds.
async fn start_room_store(state: &SharedState) {
    let backend = env::var(ROOM_STORE_ENV).unwrap_or_else(|_| "memory".into());
    match backend.trim().to_ascii_lowercase().as_str() {
        #[cfg(feature = "couch-store")]
        "couch" | "couchdb" => {
            use doodle_party_back::dao::room_store::couchdb::{CouchConfig, CouchRoomStore};

            info!("using CouchDB room store");
            tokio::spawn(storage_supervisor::run(state.clone(), || async {
                let config = CouchConfig::from_env()?;
                let store = CouchRoomStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            use doodle_party_back::dao::room_store::mongodb::{MongoConfig, MongoRoomStore};

            info!("using MongoDB room store");
            tokio::spawn(storage_supervisor::run(state.clone(), || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoRoomStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
            }));
        }
        other => {
            if other != "memory" {
                warn!(backend = other, "unknown or disabled room store; using memory");
            }
            state
                .install_room_store(Arc::new(MemoryRoomStore::new()))
                .await;
            info!("using in-memory room store");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
