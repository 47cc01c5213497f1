use thiserror::Error;

use crate::hierarchy::HierarchyLevel;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{message}")]
    HierarchyMismatch {
        level: HierarchyLevel,
        message: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn mismatch(level: HierarchyLevel, parent: HierarchyLevel) -> Self {
        Self::HierarchyMismatch {
            level,
            message: format!(
                "{} does not belong to the given {}",
                level.label(),
                parent.label()
            ),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
