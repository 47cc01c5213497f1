use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::auth::Role;
use crate::error::DomainError;
use crate::hierarchy::RecordStatus;
use crate::identity::ActorIdentity;
use crate::pagination::{Page, PageRequest};
use crate::ports::drafting_centers::DraftingCenterRepository;
use crate::util::{now_ms, same_id, trimmed, uuid_v7_without_dashes};

const MAX_NAME_LENGTH: usize = 160;
const MAX_CODE_LENGTH: usize = 32;
const MAX_ADDRESS_LENGTH: usize = 500;
const MAX_CONTACT_LENGTH: usize = 120;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[default]
    Available,
    Busy,
    Offline,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Busy => "BUSY",
            Self::Offline => "OFFLINE",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftingCenter {
    pub drafting_center_id: String,
    pub name: String,
    pub code: Option<String>,
    pub address: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub status: RecordStatus,
    pub availability: Availability,
    pub capacity: Option<u32>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

impl DraftingCenter {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DraftingCenterCreate {
    pub name: String,
    pub code: Option<String>,
    pub address: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub availability: Option<Availability>,
    pub capacity: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct DraftingCenterUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub address: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub status: Option<RecordStatus>,
    pub availability: Option<Availability>,
    pub capacity: Option<u32>,
}

impl DraftingCenterUpdate {
    fn touches_only_availability(&self) -> bool {
        self.name.is_none()
            && self.code.is_none()
            && self.address.is_none()
            && self.contact_phone.is_none()
            && self.contact_email.is_none()
            && self.status.is_none()
            && self.capacity.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DraftingCenterQuery {
    pub status: Option<RecordStatus>,
    pub availability: Option<Availability>,
    pub page: PageRequest,
}

#[derive(Clone)]
pub struct DraftingCenterService {
    repository: Arc<dyn DraftingCenterRepository>,
}

impl DraftingCenterService {
    pub fn new(repository: Arc<dyn DraftingCenterRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(
        &self,
        actor: &ActorIdentity,
        input: DraftingCenterCreate,
    ) -> DomainResult<DraftingCenter> {
        actor.require_admin()?;
        let now = now_ms();
        let mut center = DraftingCenter {
            drafting_center_id: uuid_v7_without_dashes(),
            name: input.name,
            code: input.code,
            address: input.address,
            contact_phone: input.contact_phone,
            contact_email: input.contact_email,
            status: RecordStatus::Active,
            availability: input.availability.unwrap_or_default(),
            capacity: input.capacity,
            created_at_ms: now,
            updated_at_ms: now,
            deleted_at_ms: None,
        };
        normalize_center(&mut center)?;
        let created = self
            .repository
            .create(&center)
            .await
            .map_err(|err| duplicate_code(err, center.code.as_deref()))?;
        tracing::info!(
            drafting_center_id = %created.drafting_center_id,
            "drafting center created"
        );
        Ok(created)
    }

    pub async fn get(&self, center_id: &str) -> DomainResult<DraftingCenter> {
        self.get_live(center_id).await
    }

    /// The center, unless it does not exist or was soft-deleted.
    pub async fn get_live(&self, center_id: &str) -> DomainResult<DraftingCenter> {
        self.repository
            .get(center_id.trim())
            .await?
            .filter(|center| !center.is_deleted())
            .ok_or_else(|| DomainError::not_found("drafting center"))
    }

    pub async fn list(&self, query: &DraftingCenterQuery) -> DomainResult<Page<DraftingCenter>> {
        self.repository.list(query).await
    }

    /// Admins may change anything; an operator may only flip the
    /// availability of their own center.
    pub async fn update(
        &self,
        actor: &ActorIdentity,
        center_id: &str,
        update: DraftingCenterUpdate,
    ) -> DomainResult<DraftingCenter> {
        if !actor.is_admin() {
            let linked = actor.linked_center()?;
            if !same_id(linked, center_id) || !update.touches_only_availability() {
                return Err(DomainError::Forbidden(
                    "operators may only change the availability of their own center".into(),
                ));
            }
        }

        let mut center = self.get_live(center_id).await?;
        if let Some(name) = update.name {
            center.name = name;
        }
        if let Some(code) = update.code {
            center.code = Some(code);
        }
        if let Some(address) = update.address {
            center.address = Some(address);
        }
        if let Some(phone) = update.contact_phone {
            center.contact_phone = Some(phone);
        }
        if let Some(email) = update.contact_email {
            center.contact_email = Some(email);
        }
        if let Some(status) = update.status {
            center.status = status;
        }
        if let Some(availability) = update.availability {
            center.availability = availability;
        }
        if let Some(capacity) = update.capacity {
            center.capacity = Some(capacity);
        }
        center.updated_at_ms = now_ms();
        normalize_center(&mut center)?;

        self.repository
            .update(&center)
            .await
            .map_err(|err| duplicate_code(err, center.code.as_deref()))
    }

    /// Soft delete: the record stays, marked deleted and inactive.
    pub async fn delete(
        &self,
        actor: &ActorIdentity,
        center_id: &str,
    ) -> DomainResult<DraftingCenter> {
        actor.require_admin()?;
        let mut center = self.get_live(center_id).await?;
        let now = now_ms();
        center.deleted_at_ms = Some(now);
        center.status = RecordStatus::Inactive;
        center.availability = Availability::Offline;
        center.updated_at_ms = now;
        let deleted = self.repository.update(&center).await?;
        tracing::info!(drafting_center_id = %deleted.drafting_center_id, "drafting center deleted");
        Ok(deleted)
    }
}

/// Operators are scoped to their own center for every read but availability.
pub fn ensure_center_access(actor: &ActorIdentity, center_id: &str) -> DomainResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.role == Role::DraftCenterOperator && same_id(actor.linked_center()?, center_id) {
        return Ok(());
    }
    Err(DomainError::Forbidden(
        "actor may not access this drafting center".into(),
    ))
}

fn normalize_center(center: &mut DraftingCenter) -> DomainResult<()> {
    center.name = center.name.trim().to_string();
    if center.name.is_empty() {
        return Err(DomainError::Validation("name is required".into()));
    }
    if center.name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "name exceeds max length of {MAX_NAME_LENGTH}"
        )));
    }

    center.code = trimmed(center.code.take());
    if let Some(code) = center.code.as_ref() {
        if code.chars().count() > MAX_CODE_LENGTH {
            return Err(DomainError::Validation(format!(
                "code exceeds max length of {MAX_CODE_LENGTH}"
            )));
        }
    }

    center.address = trimmed(center.address.take());
    if center
        .address
        .as_ref()
        .is_some_and(|address| address.chars().count() > MAX_ADDRESS_LENGTH)
    {
        return Err(DomainError::Validation(format!(
            "address exceeds max length of {MAX_ADDRESS_LENGTH}"
        )));
    }

    center.contact_phone = trimmed(center.contact_phone.take());
    center.contact_email = trimmed(center.contact_email.take());
    for contact in [&center.contact_phone, &center.contact_email]
        .into_iter()
        .flatten()
    {
        if contact.chars().count() > MAX_CONTACT_LENGTH {
            return Err(DomainError::Validation(format!(
                "contact exceeds max length of {MAX_CONTACT_LENGTH}"
            )));
        }
    }

    if center.capacity == Some(0) {
        return Err(DomainError::Validation(
            "capacity must be at least 1 when set".into(),
        ));
    }
    Ok(())
}

fn duplicate_code(err: DomainError, code: Option<&str>) -> DomainError {
    match err {
        DomainError::Conflict(_) => DomainError::Conflict(format!(
            "drafting center with code '{}' already exists",
            code.unwrap_or_default()
        )),
        err => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> DraftingCenter {
        DraftingCenter {
            drafting_center_id: "dc-1".into(),
            name: "  North Drafting  ".into(),
            code: Some("  ".into()),
            address: None,
            contact_phone: Some(" 080-1234 ".into()),
            contact_email: None,
            status: RecordStatus::Active,
            availability: Availability::Available,
            capacity: None,
            created_at_ms: 1,
            updated_at_ms: 1,
            deleted_at_ms: None,
        }
    }

    #[test]
    fn normalize_trims_and_drops_blank_optionals() {
        let mut value = center();
        normalize_center(&mut value).unwrap();
        assert_eq!(value.name, "North Drafting");
        assert_eq!(value.code, None);
        assert_eq!(value.contact_phone.as_deref(), Some("080-1234"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut value = center();
        value.capacity = Some(0);
        assert!(matches!(
            normalize_center(&mut value),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn operators_reach_only_their_center() {
        let operator = ActorIdentity::new("op-1", Role::DraftCenterOperator).with_center("dc-1");
        assert!(ensure_center_access(&operator, "DC-1").is_ok());
        assert!(matches!(
            ensure_center_access(&operator, "dc-2"),
            Err(DomainError::Forbidden(_))
        ));
        let surveyor = ActorIdentity::new("s-1", Role::Surveyor);
        assert!(ensure_center_access(&surveyor, "dc-1").is_err());
    }
}
