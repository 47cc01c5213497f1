use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use sketchdesk_domain::drafting_centers::{
    Availability, DraftingCenter, DraftingCenterCreate, DraftingCenterQuery, DraftingCenterUpdate,
};
use sketchdesk_domain::hierarchy::RecordStatus;
use sketchdesk_domain::pagination::Page;
use validator::Validate;

use super::{actor_identity, page_request};
use crate::error::{ApiError, map_domain_error};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::AuthContext;
use crate::{state::AppState, validation};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CenterCreateRequest {
    #[validate(length(min = 1, max = 160))]
    name: String,
    #[validate(length(min = 1, max = 32))]
    code: Option<String>,
    #[validate(length(max = 500))]
    address: Option<String>,
    #[validate(length(max = 120))]
    contact_phone: Option<String>,
    #[validate(email)]
    contact_email: Option<String>,
    availability: Option<Availability>,
    #[validate(range(min = 1))]
    capacity: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CenterUpdateRequest {
    #[validate(length(min = 1, max = 160))]
    name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    code: Option<String>,
    #[validate(length(max = 500))]
    address: Option<String>,
    #[validate(length(max = 120))]
    contact_phone: Option<String>,
    #[validate(email)]
    contact_email: Option<String>,
    status: Option<RecordStatus>,
    availability: Option<Availability>,
    #[validate(range(min = 1))]
    capacity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CenterListParams {
    status: Option<RecordStatus>,
    availability: Option<Availability>,
    page: Option<u32>,
    limit: Option<u32>,
}

pub(crate) async fn create_center(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<CenterCreateRequest>,
) -> Result<(StatusCode, Json<DraftingCenter>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let input = DraftingCenterCreate {
        name: payload.name,
        code: payload.code,
        address: payload.address,
        contact_phone: payload.contact_phone,
        contact_email: payload.contact_email,
        availability: payload.availability,
        capacity: payload.capacity,
    };
    let center = state
        .centers
        .create(&actor, input)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(center)))
}

pub(crate) async fn list_centers(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CenterListParams>,
) -> Result<Json<Page<DraftingCenter>>, ApiError> {
    let query = DraftingCenterQuery {
        status: params.status,
        availability: params.availability,
        page: page_request(params.page, params.limit)?,
    };
    let page = state
        .centers
        .list(&query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_center(
    State(state): State<AppState>,
    Path(center_id): Path<String>,
) -> Result<Json<DraftingCenter>, ApiError> {
    let center = state
        .centers
        .get(&center_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(center))
}

pub(crate) async fn update_center(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(center_id): Path<String>,
    ApiJson(payload): ApiJson<CenterUpdateRequest>,
) -> Result<Json<DraftingCenter>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let update = DraftingCenterUpdate {
        name: payload.name,
        code: payload.code,
        address: payload.address,
        contact_phone: payload.contact_phone,
        contact_email: payload.contact_email,
        status: payload.status,
        availability: payload.availability,
        capacity: payload.capacity,
    };
    let center = state
        .centers
        .update(&actor, &center_id, update)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(center))
}

pub(crate) async fn delete_center(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(center_id): Path<String>,
) -> Result<Json<DraftingCenter>, ApiError> {
    let actor = actor_identity(&auth)?;
    let center = state
        .centers
        .delete(&actor, &center_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(center))
}
