use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    DraftCenterOperator,
    Surveyor,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "draft_center_operator" | "drafting_center_operator" => {
                Some(Role::DraftCenterOperator)
            }
            "surveyor" => Some(Role::Surveyor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::DraftCenterOperator => "draft_center_operator",
            Role::Surveyor => "surveyor",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_roles_case_insensitively() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse(" surveyor "), Some(Role::Surveyor));
        assert_eq!(
            Role::parse("draft_center_operator"),
            Some(Role::DraftCenterOperator)
        );
        assert_eq!(Role::parse("moderator"), None);
    }

    #[test]
    fn only_admin_roles_are_admin() {
        assert!(Role::SuperAdmin.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Surveyor.is_admin());
        assert!(!Role::DraftCenterOperator.is_admin());
    }
}
