use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Staff = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        Role::iter().find(|r| r.id() == id)
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Admins and managers may move a request out of PENDING.
    pub fn is_approver(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn id_round_trips() {
        for role in Role::iter() {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn parses_stored_names_case_insensitively() {
        assert_eq!(Role::from_str("MANAGER").unwrap(), Role::Manager);
        assert_eq!(Role::from_str("staff").unwrap(), Role::Staff);
        assert!(Role::from_str("HR").is_err());
        assert_eq!(Role::Admin.as_ref(), "ADMIN");
    }

    #[test]
    fn only_admins_and_managers_approve() {
        assert!(Role::Admin.is_approver());
        assert!(Role::Manager.is_approver());
        assert!(!Role::Staff.is_approver());
    }
}
