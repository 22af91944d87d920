#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the traffic monitor.
//!
//! Serves the current traffic snapshot with filters, lets clients request
//! an immediate refresh, and exposes the refresh status. Queries only
//! read the in-memory snapshot; network I/O happens on the scheduler task
//! started alongside the server.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use traffic_monitor_orchestrator::{Orchestrator, Pipeline, RefreshConfig, RefreshHandle};
use traffic_monitor_store::{SnapshotStore, snapshot_path_from_env};

/// Shared application state.
pub struct AppState {
    /// The current snapshot.
    pub store: Arc<SnapshotStore>,
    /// Manual refresh trigger; also gives access to the orchestrator.
    pub refresh: RefreshHandle,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/traffic", web::get().to(handlers::traffic))
            .route("/traffic/refresh", web::post().to(handlers::refresh))
            .route("/scrape", web::post().to(handlers::refresh))
            .route("/refresh", web::post().to(handlers::refresh))
            .route("/roads", web::get().to(handlers::roads))
            .route("/cities", web::get().to(handlers::cities))
            .route("/status", web::get().to(handlers::status)),
    );
}

/// Starts the traffic monitor API server.
///
/// Loads the persisted snapshot, starts the refresh scheduler (which runs
/// one cycle immediately) and starts the Actix-Web HTTP server. This is a
/// regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`) and initialises logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP client cannot be built,
/// or if the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let config = RefreshConfig::from_env();
    log::info!(
        "Refreshing {} every {}s",
        config.source_url,
        config.refresh_interval.as_secs()
    );

    let store = Arc::new(open_store(snapshot_path_from_env()));
    let pipeline = Pipeline::from_config(&config).map_err(std::io::Error::other)?;
    let orchestrator = Arc::new(Orchestrator::new(pipeline, Arc::clone(&store)));
    let (refresh, scheduler) =
        traffic_monitor_orchestrator::spawn(orchestrator, config.refresh_interval);

    let state = web::Data::new(AppState { store, refresh });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await;

    scheduler.abort();
    result
}

/// Opens the persisted snapshot, starting empty if it cannot be read.
fn open_store(path: PathBuf) -> SnapshotStore {
    match SnapshotStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            log::warn!(
                "Could not load snapshot from {}: {e}; starting empty",
                path.display()
            );
            SnapshotStore::empty_at(path)
        }
    }
}
