use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::auth::Role;
use crate::error::DomainError;

/// Authenticated caller as supplied by the identity provider. Role and
/// center link are trusted as-is.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorIdentity {
    pub user_id: String,
    pub role: Role,
    pub center_id: Option<String>,
}

impl ActorIdentity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            center_id: None,
        }
    }

    pub fn with_center(mut self, center_id: impl Into<String>) -> Self {
        self.center_id = Some(center_id.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require_admin(&self) -> DomainResult<()> {
        if self.is_admin() {
            return Ok(());
        }
        Err(DomainError::Forbidden(format!(
            "role {} is not allowed to perform this action",
            self.role.as_str()
        )))
    }

    pub fn require_role(&self, role: Role) -> DomainResult<()> {
        if self.role == role {
            return Ok(());
        }
        Err(DomainError::Forbidden(format!(
            "action requires role {}",
            role.as_str()
        )))
    }

    /// Linked drafting center of an operator actor.
    pub fn linked_center(&self) -> DomainResult<&str> {
        if self.role != Role::DraftCenterOperator {
            return Err(DomainError::Forbidden(
                "actor is not a drafting center operator".into(),
            ));
        }
        self.center_id
            .as_deref()
            .filter(|center_id| !center_id.trim().is_empty())
            .ok_or_else(|| {
                DomainError::Forbidden("actor is not linked to a drafting center".into())
            })
    }
}
