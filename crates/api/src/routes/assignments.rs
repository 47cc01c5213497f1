use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use sketchdesk_domain::assignments::{
    Assignment, AssignmentCreate, AssignmentFilter, AssignmentStatus, AssignmentUpdate,
    RespondAction,
};
use sketchdesk_domain::pagination::Page;
use validator::Validate;

use super::{actor_identity, page_request};
use crate::error::{ApiError, map_domain_error};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::AuthContext;
use crate::{state::AppState, validation};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssignmentCreateRequest {
    #[validate(length(min = 1))]
    sketch_request_id: String,
    #[validate(length(min = 1))]
    drafting_center_id: String,
    due_date_ms: Option<i64>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentUpdateRequest {
    status: Option<AssignmentStatus>,
    due_date_ms: Option<i64>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondRequest {
    action: RespondAction,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssignmentListParams {
    status: Option<AssignmentStatus>,
    #[serde(default)]
    include_cancelled: bool,
    page: Option<u32>,
    limit: Option<u32>,
}

impl AssignmentListParams {
    fn to_filter(&self) -> Result<AssignmentFilter, ApiError> {
        Ok(AssignmentFilter {
            status: self.status,
            include_cancelled: self.include_cancelled,
            page: page_request(self.page, self.limit)?,
        })
    }
}

pub(crate) async fn create_assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<AssignmentCreateRequest>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let input = AssignmentCreate {
        sketch_request_id: payload.sketch_request_id,
        drafting_center_id: payload.drafting_center_id,
        due_date_ms: payload.due_date_ms,
        notes: payload.notes,
    };
    let assignment = state
        .assignments
        .create(&actor, input)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub(crate) async fn list_assignments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<AssignmentListParams>,
) -> Result<Json<Page<Assignment>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let page = state
        .assignments
        .list_all(&actor, params.to_filter()?)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn list_center_assignments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(center_id): Path<String>,
    ApiQuery(params): ApiQuery<AssignmentListParams>,
) -> Result<Json<Page<Assignment>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let page = state
        .assignments
        .list_by_center(&actor, &center_id, params.to_filter()?)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(assignment_id): Path<String>,
) -> Result<Json<Assignment>, ApiError> {
    let actor = actor_identity(&auth)?;
    let assignment = state
        .assignments
        .get(&actor, &assignment_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(assignment))
}

pub(crate) async fn update_assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(assignment_id): Path<String>,
    ApiJson(payload): ApiJson<AssignmentUpdateRequest>,
) -> Result<Json<Assignment>, ApiError> {
    let actor = actor_identity(&auth)?;
    let update = AssignmentUpdate {
        status: payload.status,
        due_date_ms: payload.due_date_ms,
        notes: payload.notes,
    };
    let assignment = state
        .assignments
        .update(&actor, &assignment_id, update)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(assignment))
}

pub(crate) async fn respond_to_assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(assignment_id): Path<String>,
    ApiJson(payload): ApiJson<RespondRequest>,
) -> Result<Json<Assignment>, ApiError> {
    let actor = actor_identity(&auth)?;
    let assignment = state
        .assignments
        .respond(&actor, &assignment_id, payload.action)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(assignment))
}
