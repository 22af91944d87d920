//! HTTP handler functions for the traffic monitor API.

use actix_web::{HttpResponse, web};
use traffic_monitor_orchestrator::TriggerOutcome;
use traffic_monitor_query::{TrafficFilter, TrafficQueryParams, known_roads, query};
use traffic_monitor_server_models::{
    ApiHealth, ApiRefreshResponse, ApiSnapshotSummary, ApiStatus, ApiTrafficResponse,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/traffic`
///
/// Returns the current snapshot filtered by `road`/`roads`, `city`/`cities`
/// and `min_delay`. Invalid filter values are rejected with `400`.
pub async fn traffic(
    state: web::Data<AppState>,
    params: web::Query<TrafficQueryParams>,
) -> HttpResponse {
    let filter = match TrafficFilter::from_params(&params) {
        Ok(filter) => filter,
        Err(e) => {
            log::debug!("Rejected traffic query: {e}");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            }));
        }
    };

    let snapshot = state.store.current();
    HttpResponse::Ok().json(ApiTrafficResponse::from(query(&snapshot, &filter)))
}

/// `POST /api/refresh`
///
/// Starts a refresh cycle without waiting for it to finish.
pub async fn refresh(state: web::Data<AppState>) -> HttpResponse {
    let outcome = state.refresh.trigger();
    let body = ApiRefreshResponse::from(outcome);

    match outcome {
        TriggerOutcome::Started => HttpResponse::Accepted().json(body),
        TriggerOutcome::AlreadyRunning => HttpResponse::Conflict().json(body),
        TriggerOutcome::Unavailable => HttpResponse::ServiceUnavailable().json(body),
    }
}

/// `GET /api/roads`
///
/// Lists the roads present in the current snapshot.
pub async fn roads(state: web::Data<AppState>) -> HttpResponse {
    let roads: Vec<String> = known_roads(&state.store.current())
        .into_iter()
        .map(|road| road.to_string())
        .collect();

    HttpResponse::Ok().json(roads)
}

/// `GET /api/cities`
pub async fn cities(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(city_names(&state))
}

/// `GET /api/status`
///
/// Reports the refresh state, the last finished cycle and the current
/// snapshot.
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    let orchestrator = state.refresh.orchestrator();
    let pipeline = orchestrator.pipeline();
    let snapshot = state.store.current();

    HttpResponse::Ok().json(ApiStatus {
        source: pipeline.describe(),
        phase: orchestrator.phase(),
        last_cycle: orchestrator.last_report(),
        snapshot: ApiSnapshotSummary {
            jams: snapshot.traffic_jams.len(),
            cameras: snapshot.speed_cameras.len(),
            last_updated: snapshot.last_updated,
            version: state.store.version(),
        },
        watch_roads: pipeline
            .watch_roads()
            .iter()
            .map(ToString::to_string)
            .collect(),
        cities: city_names(&state),
    })
}

fn city_names(state: &AppState) -> Vec<String> {
    state
        .refresh
        .orchestrator()
        .pipeline()
        .vocabulary()
        .city_names()
        .map(str::to_string)
        .collect()
}
