use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use sketchdesk_domain::hierarchy::{
    HierarchyLevel, HierarchyListQuery, HierarchyRef, HierarchyUpdate, RecordStatus, Region,
    RegionCreate, Settlement, SettlementCreate, SubDistrict, SubDistrictCreate, SubRegion,
    SubRegionCreate,
};
use sketchdesk_domain::pagination::Page;
use validator::Validate;

use super::{actor_identity, page_request};
use crate::error::{ApiError, map_domain_error};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::AuthContext;
use crate::{state::AppState, validation};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RegionCreateRequest {
    #[validate(length(min = 1, max = 32))]
    code: String,
    #[validate(length(min = 1, max = 120))]
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubRegionCreateRequest {
    #[validate(length(min = 1))]
    region_id: String,
    #[validate(length(min = 1, max = 32))]
    code: String,
    #[validate(length(min = 1, max = 120))]
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubDistrictCreateRequest {
    #[validate(length(min = 1))]
    region_id: String,
    #[validate(length(min = 1))]
    sub_region_id: String,
    #[validate(length(min = 1, max = 32))]
    code: String,
    #[validate(length(min = 1, max = 120))]
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SettlementCreateRequest {
    #[validate(length(min = 1))]
    region_id: String,
    #[validate(length(min = 1))]
    sub_region_id: String,
    #[validate(length(min = 1))]
    sub_district_id: String,
    #[validate(length(min = 1, max = 32))]
    code: String,
    #[validate(length(min = 1, max = 120))]
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct HierarchyUpdateRequest {
    #[validate(length(min = 1, max = 32))]
    code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    name: Option<String>,
    status: Option<RecordStatus>,
}

impl From<HierarchyUpdateRequest> for HierarchyUpdate {
    fn from(request: HierarchyUpdateRequest) -> Self {
        Self {
            code: request.code,
            name: request.name,
            status: request.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HierarchyListParams {
    region_id: Option<String>,
    sub_region_id: Option<String>,
    sub_district_id: Option<String>,
    status: Option<RecordStatus>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl HierarchyListParams {
    fn to_query(&self, parent_id: Option<&String>) -> Result<HierarchyListQuery, ApiError> {
        Ok(HierarchyListQuery {
            parent_id: parent_id.cloned(),
            status: self.status,
            page: page_request(self.page, self.limit)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupParams {
    level: HierarchyLevel,
    name: String,
    parent_id: Option<String>,
}

pub(crate) async fn create_region(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<RegionCreateRequest>,
) -> Result<(StatusCode, Json<Region>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let region = state
        .hierarchy
        .create_region(
            &actor,
            RegionCreate {
                code: payload.code,
                name: payload.name,
            },
        )
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(region)))
}

pub(crate) async fn list_regions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HierarchyListParams>,
) -> Result<Json<Page<Region>>, ApiError> {
    let query = params.to_query(None)?;
    let page = state
        .hierarchy
        .list_regions(&query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_region(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
) -> Result<Json<Region>, ApiError> {
    let region = state
        .hierarchy
        .get_region(&region_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(region))
}

pub(crate) async fn update_region(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(region_id): Path<String>,
    ApiJson(payload): ApiJson<HierarchyUpdateRequest>,
) -> Result<Json<Region>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let region = state
        .hierarchy
        .update_region(&actor, &region_id, payload.into())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(region))
}

pub(crate) async fn create_sub_region(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<SubRegionCreateRequest>,
) -> Result<(StatusCode, Json<SubRegion>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let sub_region = state
        .hierarchy
        .create_sub_region(
            &actor,
            SubRegionCreate {
                region_id: payload.region_id,
                code: payload.code,
                name: payload.name,
            },
        )
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(sub_region)))
}

pub(crate) async fn list_sub_regions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HierarchyListParams>,
) -> Result<Json<Page<SubRegion>>, ApiError> {
    let query = params.to_query(params.region_id.as_ref())?;
    let page = state
        .hierarchy
        .list_sub_regions(&query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_sub_region(
    State(state): State<AppState>,
    Path(sub_region_id): Path<String>,
) -> Result<Json<SubRegion>, ApiError> {
    let sub_region = state
        .hierarchy
        .get_sub_region(&sub_region_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(sub_region))
}

pub(crate) async fn update_sub_region(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(sub_region_id): Path<String>,
    ApiJson(payload): ApiJson<HierarchyUpdateRequest>,
) -> Result<Json<SubRegion>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let sub_region = state
        .hierarchy
        .update_sub_region(&actor, &sub_region_id, payload.into())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(sub_region))
}

pub(crate) async fn create_sub_district(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<SubDistrictCreateRequest>,
) -> Result<(StatusCode, Json<SubDistrict>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let sub_district = state
        .hierarchy
        .create_sub_district(
            &actor,
            SubDistrictCreate {
                region_id: payload.region_id,
                sub_region_id: payload.sub_region_id,
                code: payload.code,
                name: payload.name,
            },
        )
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(sub_district)))
}

pub(crate) async fn list_sub_districts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HierarchyListParams>,
) -> Result<Json<Page<SubDistrict>>, ApiError> {
    let query = params.to_query(params.sub_region_id.as_ref())?;
    let page = state
        .hierarchy
        .list_sub_districts(&query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_sub_district(
    State(state): State<AppState>,
    Path(sub_district_id): Path<String>,
) -> Result<Json<SubDistrict>, ApiError> {
    let sub_district = state
        .hierarchy
        .get_sub_district(&sub_district_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(sub_district))
}

pub(crate) async fn update_sub_district(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(sub_district_id): Path<String>,
    ApiJson(payload): ApiJson<HierarchyUpdateRequest>,
) -> Result<Json<SubDistrict>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let sub_district = state
        .hierarchy
        .update_sub_district(&actor, &sub_district_id, payload.into())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(sub_district))
}

pub(crate) async fn create_settlement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(payload): ApiJson<SettlementCreateRequest>,
) -> Result<(StatusCode, Json<Settlement>), ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let settlement = state
        .hierarchy
        .create_settlement(
            &actor,
            SettlementCreate {
                region_id: payload.region_id,
                sub_region_id: payload.sub_region_id,
                sub_district_id: payload.sub_district_id,
                code: payload.code,
                name: payload.name,
            },
        )
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(settlement)))
}

pub(crate) async fn list_settlements(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HierarchyListParams>,
) -> Result<Json<Page<Settlement>>, ApiError> {
    let query = params.to_query(params.sub_district_id.as_ref())?;
    let page = state
        .hierarchy
        .list_settlements(&query)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page))
}

pub(crate) async fn get_settlement(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
) -> Result<Json<Settlement>, ApiError> {
    let settlement = state
        .hierarchy
        .get_settlement(&settlement_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(settlement))
}

pub(crate) async fn update_settlement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(settlement_id): Path<String>,
    ApiJson(payload): ApiJson<HierarchyUpdateRequest>,
) -> Result<Json<Settlement>, ApiError> {
    validation::validate(&payload)?;
    let actor = actor_identity(&auth)?;
    let settlement = state
        .hierarchy
        .update_settlement(&actor, &settlement_id, payload.into())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(settlement))
}

pub(crate) async fn lookup_by_name(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<LookupParams>,
) -> Result<Json<HierarchyRef>, ApiError> {
    let found = state
        .hierarchy
        .find_by_name(params.level, &params.name, params.parent_id.as_deref())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(found))
}
