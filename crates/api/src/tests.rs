use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::body::to_bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, StatusCode};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use sketchdesk_infra::auth::Claims;
use sketchdesk_infra::config::AppConfig;
use tower_util::ServiceExt;

use crate::observability;
use crate::routes;
use crate::state::AppState;

const SECRET: &str = "test-secret";

fn test_config() -> AppConfig {
    AppConfig {
        app_env: "test".to_string(),
        port: 0,
        log_level: "info".to_string(),
        data_backend: "memory".to_string(),
        sequence_backend: "store".to_string(),
        surreal_endpoint: "ws://127.0.0.1:8000".to_string(),
        surreal_ns: "sketchdesk".to_string(),
        surreal_db: "test".to_string(),
        surreal_user: "root".to_string(),
        surreal_pass: "root".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        jwt_secret: SECRET.to_string(),
        application_id_max_attempts: 3,
        request_timeout_secs: 30,
    }
}

fn test_app() -> axum::Router {
    routes::router(AppState::in_memory(test_config()))
}

fn token(sub: &str, role: &str, center_id: Option<&str>) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_secs();
    let claims = Claims {
        sub: sub.to_string(),
        role: Some(role.to_string()),
        center_id: center_id.map(str::to_string),
        exp: (now + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token")
}

fn admin_token() -> String {
    token("admin-1", "admin", None)
}

fn surveyor_token() -> String {
    token("surveyor-1", "surveyor", None)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

struct Location {
    region_id: String,
    sub_region_id: String,
    sub_district_id: String,
    settlement_id: String,
}

async fn seed_location(app: &axum::Router, region_code: &str, sub_region_code: &str) -> Location {
    let admin = admin_token();
    let (status, region) = send(
        app,
        "POST",
        "/v1/regions",
        Some(&admin),
        Some(json!({ "code": region_code, "name": format!("Region {region_code}") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{region}");
    let region_id = region["region_id"].as_str().expect("region id").to_string();

    let (status, sub_region) = send(
        app,
        "POST",
        "/v1/sub-regions",
        Some(&admin),
        Some(json!({
            "region_id": region_id,
            "code": sub_region_code,
            "name": "Bengaluru North",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{sub_region}");
    let sub_region_id = sub_region["sub_region_id"]
        .as_str()
        .expect("sub region id")
        .to_string();

    let (status, sub_district) = send(
        app,
        "POST",
        "/v1/sub-districts",
        Some(&admin),
        Some(json!({
            "region_id": region_id,
            "sub_region_id": sub_region_id,
            "code": "YLK",
            "name": "Yelahanka",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{sub_district}");
    let sub_district_id = sub_district["sub_district_id"]
        .as_str()
        .expect("sub district id")
        .to_string();

    let (status, settlement) = send(
        app,
        "POST",
        "/v1/settlements",
        Some(&admin),
        Some(json!({
            "region_id": region_id,
            "sub_region_id": sub_region_id,
            "sub_district_id": sub_district_id,
            "code": "JKR",
            "name": "Jakkur",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{settlement}");
    let settlement_id = settlement["settlement_id"]
        .as_str()
        .expect("settlement id")
        .to_string();

    Location {
        region_id,
        sub_region_id,
        sub_district_id,
        settlement_id,
    }
}

async fn seed_center(app: &axum::Router, name: &str) -> String {
    let (status, center) = send(
        app,
        "POST",
        "/v1/drafting-centers",
        Some(&admin_token()),
        Some(json!({ "name": name, "capacity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{center}");
    center["drafting_center_id"]
        .as_str()
        .expect("center id")
        .to_string()
}

fn submission(location: &Location) -> Value {
    json!({
        "survey_kind": "SINGLE",
        "region_id": location.region_id,
        "sub_region_id": location.sub_region_id,
        "sub_district_id": location.sub_district_id,
        "settlement_id": location.settlement_id,
        "survey_number": "118/2",
        "documents": {
            "record_of_rights": { "url": "https://files.example/rtc.pdf" },
            "tippan": { "url": "https://files.example/tippan.pdf", "mime_type": "application/pdf" }
        }
    })
}

async fn submit(app: &axum::Router, location: &Location) -> Value {
    let (status, request) = send(
        app,
        "POST",
        "/v1/sketch-requests",
        Some(&surveyor_token()),
        Some(submission(location)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{request}");
    request
}

#[tokio::test]
async fn health_reports_ok_without_probes() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn responses_carry_request_and_correlation_ids() {
    let app = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .header("x-correlation-id", "corr-42")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(
        response
            .headers()
            .get("x-correlation-id")
            .and_then(|value| value.to_str().ok()),
        Some("corr-42")
    );
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/v1/regions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "unauthorized");

    let forged = {
        let mut token = admin_token();
        token.push('x');
        token
    };
    let (status, _) = send(&app, "GET", "/v1/regions", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown_role = token("user-9", "citizen", None);
    let (status, _) = send(&app, "GET", "/v1/regions", Some(&unknown_role), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_admins_create_hierarchy_records() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/regions",
        Some(&surveyor_token()),
        Some(json!({ "code": "KA-BLR", "name": "Bengaluru" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");
}

#[tokio::test]
async fn invalid_bodies_are_bad_requests() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/regions",
        Some(&admin_token()),
        Some(json!({ "code": "", "name": "Bengaluru" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "bad_request");

    let (status, body) = send(
        &app,
        "GET",
        "/v1/regions?limit=101",
        Some(&admin_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "bad_request");
}

#[tokio::test]
async fn unknown_enum_values_use_the_error_envelope() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "PATCH",
        "/v1/assignments/any-assignment",
        Some(&admin_token()),
        Some(json!({ "status": "DONE" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(error_code(&body), "bad_request");

    let (status, body) = send(
        &app,
        "GET",
        "/v1/assignments?status=DONE",
        Some(&admin_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(error_code(&body), "bad_request");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/regions",
        Some(&admin_token()),
        Some(json!({ "code": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(error_code(&body), "bad_request");
}

#[tokio::test]
async fn duplicate_region_code_is_a_conflict() {
    let app = test_app();
    let _ = seed_location(&app, "KA-BLR", "BLR-N").await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/regions",
        Some(&admin_token()),
        Some(json!({ "code": "KA-BLR", "name": "Again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "conflict");
}

#[tokio::test]
async fn broken_chain_is_reported_as_hierarchy_mismatch() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let other = seed_location(&app, "KA-MYS", "MYS-S").await;

    let mut body = submission(&location);
    body["sub_district_id"] = json!(other.sub_district_id);
    let (status, body) = send(
        &app,
        "POST",
        "/v1/sketch-requests",
        Some(&surveyor_token()),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "hierarchy_mismatch");
}

#[tokio::test]
async fn children_are_listed_under_their_parent() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let _ = seed_location(&app, "KA-MYS", "MYS-S").await;

    let uri = format!("/v1/sub-regions?region_id={}", location.region_id);
    let (status, page) = send(&app, "GET", &uri, Some(&surveyor_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["sub_region_id"], location.sub_region_id.as_str());

    let (status, page) = send(&app, "GET", "/v1/regions", Some(&surveyor_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn lookup_resolves_names_case_insensitively() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;

    let uri = format!(
        "/v1/hierarchy/lookup?level=settlement&name=%20jakkur%20&parent_id={}",
        location.sub_district_id
    );
    let (status, found) = send(&app, "GET", &uri, Some(&surveyor_token()), None).await;
    assert_eq!(status, StatusCode::OK, "{found}");
    assert_eq!(found["id"], location.settlement_id.as_str());
    assert_eq!(found["level"], "settlement");

    let (status, body) = send(
        &app,
        "GET",
        "/v1/hierarchy/lookup?level=region&name=nowhere",
        Some(&surveyor_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");
}

#[tokio::test]
async fn submission_receives_a_sequenced_application_id() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;

    let first = submit(&app, &location).await;
    let second = submit(&app, &location).await;
    let first_id = first["application_id"].as_str().expect("application id");
    let second_id = second["application_id"].as_str().expect("application id");
    assert!(first_id.starts_with("KA-BLR/BLR-N/"), "{first_id}");
    assert!(first_id.ends_with("/1"), "{first_id}");
    assert!(second_id.ends_with("/2"), "{second_id}");
    assert_eq!(first["status"], "PENDING");
}

#[tokio::test]
async fn surveyors_only_see_their_own_requests() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let request = submit(&app, &location).await;
    let uri = format!(
        "/v1/sketch-requests/{}",
        request["sketch_request_id"].as_str().expect("id")
    );

    let other = token("surveyor-2", "surveyor", None);
    let (status, body) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");

    let (status, page) = send(&app, "GET", "/v1/sketch-requests", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);

    let (status, _) = send(&app, "GET", &uri, Some(&surveyor_token()), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn assignment_workflow_over_http() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let center_id = seed_center(&app, "North Drafting").await;
    let request = submit(&app, &location).await;
    let sketch_request_id = request["sketch_request_id"].as_str().expect("id").to_string();
    let admin = admin_token();

    let (status, assignment) = send(
        &app,
        "POST",
        "/v1/assignments",
        Some(&admin),
        Some(json!({
            "sketch_request_id": sketch_request_id,
            "drafting_center_id": center_id,
            "notes": "priority parcel",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{assignment}");
    assert_eq!(assignment["status"], "ASSIGNED");
    let assignment_id = assignment["assignment_id"].as_str().expect("id").to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/v1/assignments",
        Some(&admin),
        Some(json!({
            "sketch_request_id": sketch_request_id,
            "drafting_center_id": center_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "conflict");

    let (_, request) = send(
        &app,
        "GET",
        &format!("/v1/sketch-requests/{sketch_request_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(request["status"], "ASSIGNED");

    let operator = token("operator-1", "draft_center_operator", Some(&center_id));
    let (status, accepted) = send(
        &app,
        "POST",
        &format!("/v1/assignments/{assignment_id}/respond"),
        Some(&operator),
        Some(json!({ "action": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{accepted}");
    assert_eq!(accepted["status"], "IN_PROGRESS");
    assert_eq!(accepted["assigned_to_user_id"], "operator-1");

    let (status, page) = send(
        &app,
        "GET",
        &format!("/v1/drafting-centers/{center_id}/assignments"),
        Some(&operator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let (status, completed) = send(
        &app,
        "PATCH",
        &format!("/v1/assignments/{assignment_id}"),
        Some(&admin),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{completed}");
    assert_eq!(completed["status"], "COMPLETED");
    assert!(completed["completed_at_ms"].is_i64());

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/v1/assignments/{assignment_id}"),
        Some(&admin),
        Some(json!({ "status": "IN_PROGRESS" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "bad_request");

    let (status, page) = send(
        &app,
        "GET",
        "/v1/sketch-requests/with-assignments",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"][0]["sketch_request_id"], sketch_request_id.as_str());
    assert_eq!(page["items"][0]["assignment"]["assignment_id"], assignment_id.as_str());
}

#[tokio::test]
async fn rejection_returns_request_to_pending() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let center_id = seed_center(&app, "North Drafting").await;
    let request = submit(&app, &location).await;
    let sketch_request_id = request["sketch_request_id"].as_str().expect("id").to_string();
    let admin = admin_token();

    let (_, assignment) = send(
        &app,
        "POST",
        "/v1/assignments",
        Some(&admin),
        Some(json!({
            "sketch_request_id": sketch_request_id,
            "drafting_center_id": center_id,
        })),
    )
    .await;
    let assignment_id = assignment["assignment_id"].as_str().expect("id").to_string();

    let operator = token("operator-1", "draft_center_operator", Some(&center_id));
    let (status, rejected) = send(
        &app,
        "POST",
        &format!("/v1/assignments/{assignment_id}/respond"),
        Some(&operator),
        Some(json!({ "action": "reject" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{rejected}");
    assert_eq!(rejected["status"], "CANCELLED");

    let (status, reconciled) = send(
        &app,
        "POST",
        &format!("/v1/sketch-requests/{sketch_request_id}/reconcile"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reconciled["status"], "PENDING");

    let (status, page) = send(&app, "GET", "/v1/assignments", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn operators_cannot_touch_other_centers() {
    let app = test_app();
    let location = seed_location(&app, "KA-BLR", "BLR-N").await;
    let center_id = seed_center(&app, "North Drafting").await;
    let other_center = seed_center(&app, "South Drafting").await;
    let request = submit(&app, &location).await;

    let (_, assignment) = send(
        &app,
        "POST",
        "/v1/assignments",
        Some(&admin_token()),
        Some(json!({
            "sketch_request_id": request["sketch_request_id"],
            "drafting_center_id": center_id,
        })),
    )
    .await;
    let assignment_id = assignment["assignment_id"].as_str().expect("id").to_string();

    let outsider = token("operator-2", "draft_center_operator", Some(&other_center));
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/assignments/{assignment_id}/respond"),
        Some(&outsider),
        Some(json!({ "action": "accept" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");

    let (status, _) = send(
        &app,
        "GET",
        &format!("/v1/assignments/{assignment_id}"),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/v1/drafting-centers/{center_id}/assignments"),
        Some(&outsider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn operators_may_only_flip_their_own_availability() {
    let app = test_app();
    let center_id = seed_center(&app, "North Drafting").await;
    let operator = token("operator-1", "draft_center_operator", Some(&center_id));
    let uri = format!("/v1/drafting-centers/{center_id}");

    let (status, center) = send(
        &app,
        "PATCH",
        &uri,
        Some(&operator),
        Some(json!({ "availability": "BUSY" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{center}");
    assert_eq!(center["availability"], "BUSY");

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&operator),
        Some(json!({ "capacity": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleted_centers_disappear_from_reads() {
    let app = test_app();
    let center_id = seed_center(&app, "North Drafting").await;
    let uri = format!("/v1/drafting-centers/{center_id}");

    let (status, deleted) = send(&app, "DELETE", &uri, Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["status"], "INACTIVE");
    assert!(deleted["deleted_at_ms"].is_i64());

    let (status, _) = send(&app, "GET", &uri, Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = send(
        &app,
        "GET",
        "/v1/drafting-centers",
        Some(&admin_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn metrics_endpoint_is_exposed() {
    let _ = observability::init_metrics();
    let app = test_app();

    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("text/plain"))
    );
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = String::from_utf8(body.to_vec()).expect("metrics body");
    assert!(
        body.contains("sketchdesk_api_http_requests_total")
            || body.contains("sketchdesk_api_http_request_duration_seconds")
    );
}
