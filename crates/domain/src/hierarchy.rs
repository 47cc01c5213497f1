use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::pagination::{Page, PageRequest};
use crate::ports::hierarchy::HierarchyRepository;
use crate::util::{now_ms, same_id, uuid_v7_without_dashes};

const MAX_CODE_LENGTH: usize = 32;
const MAX_NAME_LENGTH: usize = 120;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Region,
    SubRegion,
    SubDistrict,
    Settlement,
}

impl HierarchyLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Region => "Region",
            Self::SubRegion => "SubRegion",
            Self::SubDistrict => "SubDistrict",
            Self::Settlement => "Settlement",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::SubRegion => "sub_region",
            Self::SubDistrict => "sub_district",
            Self::Settlement => "settlement",
        }
    }

    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Region => "region_id",
            Self::SubRegion => "sub_region_id",
            Self::SubDistrict => "sub_district_id",
            Self::Settlement => "settlement_id",
        }
    }

    pub fn parent(&self) -> Option<HierarchyLevel> {
        match self {
            Self::Region => None,
            Self::SubRegion => Some(Self::Region),
            Self::SubDistrict => Some(Self::SubRegion),
            Self::Settlement => Some(Self::SubDistrict),
        }
    }

    pub fn parent_field(&self) -> Option<&'static str> {
        self.parent().map(|parent| parent.id_field())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

/// Common shape of the four hierarchy levels. Uniqueness of `code` is
/// scoped to `parent_id` (global for regions).
pub trait HierarchyNode:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const LEVEL: HierarchyLevel;

    fn id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;
    fn code(&self) -> &str;
    fn name(&self) -> &str;
    fn status(&self) -> RecordStatus;
    fn created_at_ms(&self) -> i64;
    fn set_attributes(&mut self, code: String, name: String, status: RecordStatus, at_ms: i64);
}

macro_rules! hierarchy_node {
    ($ty:ty, $level:expr, $id:ident, $parent:expr) => {
        impl HierarchyNode for $ty {
            const LEVEL: HierarchyLevel = $level;

            fn id(&self) -> &str {
                &self.$id
            }

            fn parent_id(&self) -> Option<&str> {
                let parent: fn(&$ty) -> Option<&str> = $parent;
                parent(self)
            }

            fn code(&self) -> &str {
                &self.code
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn status(&self) -> RecordStatus {
                self.status
            }

            fn created_at_ms(&self) -> i64 {
                self.created_at_ms
            }

            fn set_attributes(
                &mut self,
                code: String,
                name: String,
                status: RecordStatus,
                at_ms: i64,
            ) {
                self.code = code;
                self.name = name;
                self.status = status;
                self.updated_at_ms = at_ms;
            }
        }
    };
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub region_id: String,
    pub code: String,
    pub name: String,
    pub status: RecordStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubRegion {
    pub sub_region_id: String,
    pub region_id: String,
    pub code: String,
    pub name: String,
    pub status: RecordStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubDistrict {
    pub sub_district_id: String,
    pub sub_region_id: String,
    pub region_id: String,
    pub code: String,
    pub name: String,
    pub status: RecordStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    pub settlement_id: String,
    pub region_id: String,
    pub sub_region_id: String,
    pub sub_district_id: String,
    pub code: String,
    pub name: String,
    pub status: RecordStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

hierarchy_node!(Region, HierarchyLevel::Region, region_id, |_| None);
hierarchy_node!(SubRegion, HierarchyLevel::SubRegion, sub_region_id, |node| {
    Some(node.region_id.as_str())
});
hierarchy_node!(
    SubDistrict,
    HierarchyLevel::SubDistrict,
    sub_district_id,
    |node| Some(node.sub_region_id.as_str())
);
hierarchy_node!(
    Settlement,
    HierarchyLevel::Settlement,
    settlement_id,
    |node| Some(node.sub_district_id.as_str())
);

#[derive(Clone, Debug)]
pub struct RegionCreate {
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct SubRegionCreate {
    pub region_id: String,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct SubDistrictCreate {
    pub region_id: String,
    pub sub_region_id: String,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct SettlementCreate {
    pub region_id: String,
    pub sub_region_id: String,
    pub sub_district_id: String,
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct HierarchyUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub status: Option<RecordStatus>,
}

#[derive(Clone, Debug, Default)]
pub struct HierarchyListQuery {
    pub parent_id: Option<String>,
    pub status: Option<RecordStatus>,
    pub page: PageRequest,
}

/// Result of a name lookup, level-agnostic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HierarchyRef {
    pub level: HierarchyLevel,
    pub id: String,
    pub parent_id: Option<String>,
    pub code: String,
    pub name: String,
}

impl HierarchyRef {
    fn from_node<T: HierarchyNode>(node: &T) -> Self {
        Self {
            level: T::LEVEL,
            id: node.id().to_string(),
            parent_id: node.parent_id().map(str::to_string),
            code: node.code().to_string(),
            name: node.name().to_string(),
        }
    }
}

/// A fully verified four-level location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedChain {
    pub region: Region,
    pub sub_region: SubRegion,
    pub sub_district: SubDistrict,
    pub settlement: Settlement,
}

impl ResolvedChain {
    pub fn require_active(&self) -> DomainResult<()> {
        let levels = [
            (HierarchyLevel::Region, self.region.status),
            (HierarchyLevel::SubRegion, self.sub_region.status),
            (HierarchyLevel::SubDistrict, self.sub_district.status),
            (HierarchyLevel::Settlement, self.settlement.status),
        ];
        for (level, status) in levels {
            if status != RecordStatus::Active {
                return Err(DomainError::Validation(format!(
                    "{} is inactive",
                    level.label()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct HierarchyRepositories {
    pub regions: Arc<dyn HierarchyRepository<Region>>,
    pub sub_regions: Arc<dyn HierarchyRepository<SubRegion>>,
    pub sub_districts: Arc<dyn HierarchyRepository<SubDistrict>>,
    pub settlements: Arc<dyn HierarchyRepository<Settlement>>,
}

#[derive(Clone)]
pub struct HierarchyService {
    repos: HierarchyRepositories,
}

impl HierarchyService {
    pub fn new(repos: HierarchyRepositories) -> Self {
        Self { repos }
    }

    pub async fn create_region(
        &self,
        actor: &ActorIdentity,
        input: RegionCreate,
    ) -> DomainResult<Region> {
        actor.require_admin()?;
        let (code, name) = validate_code_and_name(&input.code, &input.name)?;
        let now = now_ms();
        let region = Region {
            region_id: uuid_v7_without_dashes(),
            code,
            name,
            status: RecordStatus::Active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        create_node(self.repos.regions.as_ref(), &region).await
    }

    pub async fn create_sub_region(
        &self,
        actor: &ActorIdentity,
        input: SubRegionCreate,
    ) -> DomainResult<SubRegion> {
        actor.require_admin()?;
        let (code, name) = validate_code_and_name(&input.code, &input.name)?;
        let region = self.get_region(&input.region_id).await?;
        let now = now_ms();
        let sub_region = SubRegion {
            sub_region_id: uuid_v7_without_dashes(),
            region_id: region.region_id,
            code,
            name,
            status: RecordStatus::Active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        create_node(self.repos.sub_regions.as_ref(), &sub_region).await
    }

    pub async fn create_sub_district(
        &self,
        actor: &ActorIdentity,
        input: SubDistrictCreate,
    ) -> DomainResult<SubDistrict> {
        actor.require_admin()?;
        let (code, name) = validate_code_and_name(&input.code, &input.name)?;
        let (region, sub_region) = self
            .resolve_sub_region(&input.region_id, &input.sub_region_id)
            .await?;
        let now = now_ms();
        let sub_district = SubDistrict {
            sub_district_id: uuid_v7_without_dashes(),
            sub_region_id: sub_region.sub_region_id,
            region_id: region.region_id,
            code,
            name,
            status: RecordStatus::Active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        create_node(self.repos.sub_districts.as_ref(), &sub_district).await
    }

    pub async fn create_settlement(
        &self,
        actor: &ActorIdentity,
        input: SettlementCreate,
    ) -> DomainResult<Settlement> {
        actor.require_admin()?;
        let (code, name) = validate_code_and_name(&input.code, &input.name)?;
        let (region, sub_region, sub_district) = self
            .resolve_sub_district(
                &input.region_id,
                &input.sub_region_id,
                &input.sub_district_id,
            )
            .await?;
        let now = now_ms();
        let settlement = Settlement {
            settlement_id: uuid_v7_without_dashes(),
            region_id: region.region_id,
            sub_region_id: sub_region.sub_region_id,
            sub_district_id: sub_district.sub_district_id,
            code,
            name,
            status: RecordStatus::Active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        create_node(self.repos.settlements.as_ref(), &settlement).await
    }

    pub async fn get_region(&self, region_id: &str) -> DomainResult<Region> {
        fetch_node(self.repos.regions.as_ref(), region_id).await
    }

    pub async fn get_sub_region(&self, sub_region_id: &str) -> DomainResult<SubRegion> {
        fetch_node(self.repos.sub_regions.as_ref(), sub_region_id).await
    }

    pub async fn get_sub_district(&self, sub_district_id: &str) -> DomainResult<SubDistrict> {
        fetch_node(self.repos.sub_districts.as_ref(), sub_district_id).await
    }

    pub async fn get_settlement(&self, settlement_id: &str) -> DomainResult<Settlement> {
        fetch_node(self.repos.settlements.as_ref(), settlement_id).await
    }

    pub async fn list_regions(&self, query: &HierarchyListQuery) -> DomainResult<Page<Region>> {
        self.repos.regions.list(query).await
    }

    pub async fn list_sub_regions(
        &self,
        query: &HierarchyListQuery,
    ) -> DomainResult<Page<SubRegion>> {
        self.repos.sub_regions.list(query).await
    }

    pub async fn list_sub_districts(
        &self,
        query: &HierarchyListQuery,
    ) -> DomainResult<Page<SubDistrict>> {
        self.repos.sub_districts.list(query).await
    }

    pub async fn list_settlements(
        &self,
        query: &HierarchyListQuery,
    ) -> DomainResult<Page<Settlement>> {
        self.repos.settlements.list(query).await
    }

    pub async fn update_region(
        &self,
        actor: &ActorIdentity,
        region_id: &str,
        update: HierarchyUpdate,
    ) -> DomainResult<Region> {
        actor.require_admin()?;
        update_node(self.repos.regions.as_ref(), region_id, update).await
    }

    pub async fn update_sub_region(
        &self,
        actor: &ActorIdentity,
        sub_region_id: &str,
        update: HierarchyUpdate,
    ) -> DomainResult<SubRegion> {
        actor.require_admin()?;
        update_node(self.repos.sub_regions.as_ref(), sub_region_id, update).await
    }

    pub async fn update_sub_district(
        &self,
        actor: &ActorIdentity,
        sub_district_id: &str,
        update: HierarchyUpdate,
    ) -> DomainResult<SubDistrict> {
        actor.require_admin()?;
        update_node(self.repos.sub_districts.as_ref(), sub_district_id, update).await
    }

    pub async fn update_settlement(
        &self,
        actor: &ActorIdentity,
        settlement_id: &str,
        update: HierarchyUpdate,
    ) -> DomainResult<Settlement> {
        actor.require_admin()?;
        update_node(self.repos.settlements.as_ref(), settlement_id, update).await
    }

    /// Resolves every level, then walks the parent pointers top-down and
    /// fails on the first one that does not match the declared ancestor.
    pub async fn validate_chain(
        &self,
        region_id: &str,
        sub_region_id: &str,
        sub_district_id: &str,
        settlement_id: &str,
    ) -> DomainResult<ResolvedChain> {
        let region = self.get_region(region_id).await?;
        let sub_region = self.get_sub_region(sub_region_id).await?;
        let sub_district = self.get_sub_district(sub_district_id).await?;
        let settlement = self.get_settlement(settlement_id).await?;

        check_sub_region(&sub_region, region_id)?;
        check_sub_district(&sub_district, region_id, sub_region_id)?;
        check_settlement(&settlement, region_id, sub_region_id, sub_district_id)?;

        Ok(ResolvedChain {
            region,
            sub_region,
            sub_district,
            settlement,
        })
    }

    /// Case-insensitive exact match on the trimmed name, scoped to the
    /// direct parent when one is given.
    pub async fn find_by_name(
        &self,
        level: HierarchyLevel,
        name: &str,
        parent_id: Option<&str>,
    ) -> DomainResult<HierarchyRef> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(DomainError::Validation("name is required".into()));
        }
        let parent_id = parent_id
            .map(str::trim)
            .filter(|parent_id| !parent_id.is_empty() && level.parent().is_some());
        match level {
            HierarchyLevel::Region => {
                lookup_node(self.repos.regions.as_ref(), &name, parent_id).await
            }
            HierarchyLevel::SubRegion => {
                lookup_node(self.repos.sub_regions.as_ref(), &name, parent_id).await
            }
            HierarchyLevel::SubDistrict => {
                lookup_node(self.repos.sub_districts.as_ref(), &name, parent_id).await
            }
            HierarchyLevel::Settlement => {
                lookup_node(self.repos.settlements.as_ref(), &name, parent_id).await
            }
        }
    }

    async fn resolve_sub_region(
        &self,
        region_id: &str,
        sub_region_id: &str,
    ) -> DomainResult<(Region, SubRegion)> {
        let region = self.get_region(region_id).await?;
        let sub_region = self.get_sub_region(sub_region_id).await?;
        check_sub_region(&sub_region, region_id)?;
        Ok((region, sub_region))
    }

    async fn resolve_sub_district(
        &self,
        region_id: &str,
        sub_region_id: &str,
        sub_district_id: &str,
    ) -> DomainResult<(Region, SubRegion, SubDistrict)> {
        let (region, sub_region) = self.resolve_sub_region(region_id, sub_region_id).await?;
        let sub_district = self.get_sub_district(sub_district_id).await?;
        check_sub_district(&sub_district, region_id, sub_region_id)?;
        Ok((region, sub_region, sub_district))
    }
}

fn check_sub_region(sub_region: &SubRegion, region_id: &str) -> DomainResult<()> {
    if !same_id(&sub_region.region_id, region_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::SubRegion,
            HierarchyLevel::Region,
        ));
    }
    Ok(())
}

fn check_sub_district(
    sub_district: &SubDistrict,
    region_id: &str,
    sub_region_id: &str,
) -> DomainResult<()> {
    if !same_id(&sub_district.sub_region_id, sub_region_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::SubDistrict,
            HierarchyLevel::SubRegion,
        ));
    }
    if !same_id(&sub_district.region_id, region_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::SubDistrict,
            HierarchyLevel::Region,
        ));
    }
    Ok(())
}

fn check_settlement(
    settlement: &Settlement,
    region_id: &str,
    sub_region_id: &str,
    sub_district_id: &str,
) -> DomainResult<()> {
    if !same_id(&settlement.sub_district_id, sub_district_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::Settlement,
            HierarchyLevel::SubDistrict,
        ));
    }
    if !same_id(&settlement.sub_region_id, sub_region_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::Settlement,
            HierarchyLevel::SubRegion,
        ));
    }
    if !same_id(&settlement.region_id, region_id) {
        return Err(DomainError::mismatch(
            HierarchyLevel::Settlement,
            HierarchyLevel::Region,
        ));
    }
    Ok(())
}

async fn create_node<T: HierarchyNode>(
    repository: &dyn HierarchyRepository<T>,
    node: &T,
) -> DomainResult<T> {
    match repository.create(node).await {
        Ok(created) => {
            tracing::info!(
                level = T::LEVEL.label(),
                id = created.id(),
                code = created.code(),
                "hierarchy node created"
            );
            Ok(created)
        }
        Err(DomainError::Conflict(_)) => Err(duplicate_code(T::LEVEL, node.code())),
        Err(err) => Err(err),
    }
}

async fn fetch_node<T: HierarchyNode>(
    repository: &dyn HierarchyRepository<T>,
    id: &str,
) -> DomainResult<T> {
    let id = id.trim();
    if id.is_empty() {
        return Err(DomainError::Validation(format!(
            "{} id is required",
            T::LEVEL.label()
        )));
    }
    repository
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found(T::LEVEL.label()))
}

async fn update_node<T: HierarchyNode>(
    repository: &dyn HierarchyRepository<T>,
    id: &str,
    update: HierarchyUpdate,
) -> DomainResult<T> {
    let mut node = fetch_node(repository, id).await?;
    let code = update.code.unwrap_or_else(|| node.code().to_string());
    let name = update.name.unwrap_or_else(|| node.name().to_string());
    let (code, name) = validate_code_and_name(&code, &name)?;
    let status = update.status.unwrap_or(node.status());
    node.set_attributes(code, name, status, now_ms());
    match repository.update(&node).await {
        Err(DomainError::Conflict(_)) => Err(duplicate_code(T::LEVEL, node.code())),
        result => result,
    }
}

async fn lookup_node<T: HierarchyNode>(
    repository: &dyn HierarchyRepository<T>,
    name: &str,
    parent_id: Option<&str>,
) -> DomainResult<HierarchyRef> {
    let mut matches = repository.find_by_name(name, parent_id).await?;
    match matches.len() {
        0 => Err(DomainError::not_found(format!(
            "{} named '{name}'",
            T::LEVEL.label()
        ))),
        1 => Ok(HierarchyRef::from_node(&matches.remove(0))),
        // several hits are not a usable answer either
        count => Err(DomainError::not_found(format!(
            "unique {} named '{name}' ({count} candidates; use an id)",
            T::LEVEL.label()
        ))),
    }
}

fn duplicate_code(level: HierarchyLevel, code: &str) -> DomainError {
    DomainError::Conflict(format!(
        "{} with code '{code}' already exists in this scope",
        level.label()
    ))
}

pub fn validate_code_and_name(code: &str, name: &str) -> DomainResult<(String, String)> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DomainError::Validation("code is required".into()));
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(DomainError::Validation(format!(
            "code exceeds max length of {MAX_CODE_LENGTH}"
        )));
    }
    // codes are embedded in application ids, so the separator is reserved
    if !code
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(DomainError::Validation(
            "code may only contain letters, digits, '-' and '_'".into(),
        ));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "name exceeds max length of {MAX_NAME_LENGTH}"
        )));
    }
    Ok((code.to_string(), name.to_string()))
}
