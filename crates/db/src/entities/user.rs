//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User roles in the approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "teacher")]
    Teacher,
    #[sea_orm(string_value = "hod")]
    Hod,
    #[sea_orm(string_value = "principal")]
    Principal,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// The string form stored in history snapshots and returned by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Hod => "hod",
            Self::Principal => "principal",
            Self::Admin => "admin",
        }
    }

    /// Whether this role reviews complaints at one of the approval stages.
    #[must_use]
    pub const fn is_reviewer(self) -> bool {
        matches!(self, Self::Teacher | Self::Hod | Self::Principal)
    }
}

/// User model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Login email, stored lowercased.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2 password hash.
    pub password_hash: String,

    /// Role in the approval chain.
    pub role: Role,

    /// Optional supervising teacher (students only).
    #[sea_orm(nullable)]
    pub teacher_id: Option<String>,

    /// Opaque bearer token for API authentication.
    #[sea_orm(unique, nullable)]
    pub token: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::complaint::Entity")]
    Complaints,

    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,
}

impl Related<super::complaint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Complaints.def()
    }
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_snapshot_strings() {
        assert_eq!(Role::Student.as_str(), "student");
        assert_eq!(Role::Teacher.as_str(), "teacher");
        assert_eq!(Role::Hod.as_str(), "hod");
        assert_eq!(Role::Principal.as_str(), "principal");
        assert_eq!(Role::Admin.as_str(), "admin");
    }

    #[test]
    fn test_reviewer_roles() {
        assert!(Role::Teacher.is_reviewer());
        assert!(Role::Hod.is_reviewer());
        assert!(Role::Principal.is_reviewer());
        assert!(!Role::Student.is_reviewer());
        assert!(!Role::Admin.is_reviewer());
    }
}
