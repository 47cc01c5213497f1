use axum::extract::State;
use axum::{
    Json, Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use sketchdesk_domain::identity::ActorIdentity;
use sketchdesk_domain::pagination::PageRequest;

use crate::error::{ApiError, map_domain_error};
use crate::middleware::AuthContext;
use crate::{middleware as app_middleware, observability, state::AppState};

mod assignments;
mod drafting_centers;
mod hierarchy;
mod sketch_requests;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/v1/regions",
            post(hierarchy::create_region).get(hierarchy::list_regions),
        )
        .route(
            "/v1/regions/:region_id",
            get(hierarchy::get_region).patch(hierarchy::update_region),
        )
        .route(
            "/v1/sub-regions",
            post(hierarchy::create_sub_region).get(hierarchy::list_sub_regions),
        )
        .route(
            "/v1/sub-regions/:sub_region_id",
            get(hierarchy::get_sub_region).patch(hierarchy::update_sub_region),
        )
        .route(
            "/v1/sub-districts",
            post(hierarchy::create_sub_district).get(hierarchy::list_sub_districts),
        )
        .route(
            "/v1/sub-districts/:sub_district_id",
            get(hierarchy::get_sub_district).patch(hierarchy::update_sub_district),
        )
        .route(
            "/v1/settlements",
            post(hierarchy::create_settlement).get(hierarchy::list_settlements),
        )
        .route(
            "/v1/settlements/:settlement_id",
            get(hierarchy::get_settlement).patch(hierarchy::update_settlement),
        )
        .route("/v1/hierarchy/lookup", get(hierarchy::lookup_by_name))
        .route(
            "/v1/drafting-centers",
            post(drafting_centers::create_center).get(drafting_centers::list_centers),
        )
        .route(
            "/v1/drafting-centers/:center_id",
            get(drafting_centers::get_center)
                .patch(drafting_centers::update_center)
                .delete(drafting_centers::delete_center),
        )
        .route(
            "/v1/drafting-centers/:center_id/assignments",
            get(assignments::list_center_assignments),
        )
        .route(
            "/v1/sketch-requests",
            post(sketch_requests::create_sketch_request).get(sketch_requests::list_sketch_requests),
        )
        .route(
            "/v1/sketch-requests/with-assignments",
            get(sketch_requests::list_with_assignments),
        )
        .route(
            "/v1/sketch-requests/:sketch_request_id",
            get(sketch_requests::get_sketch_request),
        )
        .route(
            "/v1/sketch-requests/:sketch_request_id/reconcile",
            post(sketch_requests::reconcile_sketch_request),
        )
        .route(
            "/v1/assignments",
            post(assignments::create_assignment).get(assignments::list_assignments),
        )
        .route(
            "/v1/assignments/:assignment_id",
            get(assignments::get_assignment).patch(assignments::update_assignment),
        )
        .route(
            "/v1/assignments/:assignment_id/respond",
            post(assignments::respond_to_assignment),
        )
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(protected)
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer(
            state.config.request_timeout_secs,
        ))
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.is_test() {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    backends: Vec<BackendHealth>,
}

#[derive(Serialize)]
struct BackendHealth {
    name: &'static str,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut backends = Vec::with_capacity(state.probes.len());
    for probe in &state.probes {
        let result = probe.probe().await;
        if let Err(err) = &result {
            tracing::warn!(backend = probe.name(), error = %err, "health probe failed");
        }
        backends.push(BackendHealth {
            name: probe.name(),
            healthy: result.is_ok(),
            error: result.err().map(|err| err.reason),
        });
    }
    let healthy = backends.iter().all(|backend| backend.healthy);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            environment: state.config.app_env.clone(),
            backends,
        }),
    )
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

pub(crate) fn page_request(page: Option<u32>, limit: Option<u32>) -> Result<PageRequest, ApiError> {
    PageRequest::new(page, limit).map_err(map_domain_error)
}

pub(crate) fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    auth.actor.clone().ok_or(ApiError::Unauthorized)
}
