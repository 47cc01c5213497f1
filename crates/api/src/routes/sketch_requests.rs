use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use sketchdesk_domain::pagination::Page;
use sketchdesk_domain::sketch_requests::{
    DocumentKind, DocumentUpload, SketchRequest, SketchRequestCreate, SketchRequestFilter,
    SketchRequestStatus, SketchRequestWithAssignment, SurveyKind,
};
use validator::Validate;

use super::{actor_identity, page_request};
use crate::error::{ApiError, map_domain_error};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::AuthContext;
use crate::{state::AppState, validation};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SketchRequestCreateRequest {
    survey_kind: SurveyKind,
    #[validate(length(min = 1))]
    region_id: String,
    #[validate(length(min = 1))]
    sub_region_id: String,
    #[validate(length(min = 1))]
    sub_district_id: String,
    #[validate(length(min = 1))]
    settlement_id: String,
    #[validate(length(min = 1, max = 64))]
    survey_number: String,
    #[serde(default)]
    documents: BTreeMap<DocumentKind, DocumentUpload>,
    audio: Option<DocumentUpload>,
    #[serde(default)]
    extra_documents: Vec<DocumentUpload>,
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SketchRequestListParams {
    submitter_id: Option<String>,
    status: Option<SketchRequestStatus>,
    drafting_center_id: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WithAssignmentsParams {
    page: Option<u32>,
    limit: Option<u32>,
}

pub(crate) async fn create_sketch_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<SketchRequestCreateRequest>,
) -> Result<(StatusCode, Json<SketchRequest>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let input = SketchRequestCreate {
        survey_kind: payload.survey_kind,
        region_id: payload.region_id,
        sub_region_id: payload.sub_region_id,
        sub_district_id: payload.sub_district_id,
        settlement_id: payload.settlement_id,
        survey_number: payload.survey_number,
        documents: payload.documents,
        audio: payload.audio,
        extra_documents: payload.extra_documents,
        notes: payload.notes,
    };
    let request = state
        .sketch_requests
        .create(&actor, input)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub(crate) async fn list_sketch_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<SketchRequestListParams>,
) -> Result<Json<Page<SketchRequest>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let filter = SketchRequestFilter {
        submitter_id: params.submitter_id,
        status: params.status,
        drafting_center_id: params.drafting_center_id,
        page: page_request(params.page, params.limit)?,
    };
    let page = state
        .sketch_requests
        .list(&actor, filter)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn list_with_assignments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(params): ApiQuery<WithAssignmentsParams>,
) -> Result<Json<Page<SketchRequestWithAssignment>>, ApiError> {
    let actor = actor_identity(&auth)?;
    let page = state
        .sketch_requests
        .list_with_assignments(&actor, page_request(params.page, params.limit)?)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_sketch_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(sketch_request_id): Path<String>,
) -> Result<Json<SketchRequest>, ApiError> {
    let actor = actor_identity(&auth)?;
    let request = state
        .sketch_requests
        .get(&actor, &sketch_request_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(request))
}

pub(crate) async fn reconcile_sketch_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(sketch_request_id): Path<String>,
) -> Result<Json<SketchRequest>, ApiError> {
    let actor = actor_identity(&auth)?;
    let request = state
        .sketch_requests
        .reconcile_status(&actor, &sketch_request_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(request))
}
