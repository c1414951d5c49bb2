//! Complaint entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user::Role;

/// Which role currently owns a complaint, or the terminal position it
/// reached. Orthogonal to [`Status`]: stage tracks position, status tracks
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Stage {
    #[sea_orm(string_value = "teacher")]
    #[default]
    Teacher,
    #[sea_orm(string_value = "hod")]
    Hod,
    #[sea_orm(string_value = "principal")]
    Principal,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl Stage {
    /// The string form returned by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Hod => "hod",
            Self::Principal => "principal",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }

    /// Whether a complaint at this stage still awaits a decision.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Teacher | Self::Hod | Self::Principal)
    }

    /// The role that owns complaints at this stage, if any.
    #[must_use]
    pub const fn owning_role(self) -> Option<Role> {
        match self {
            Self::Teacher => Some(Role::Teacher),
            Self::Hod => Some(Role::Hod),
            Self::Principal => Some(Role::Principal),
            Self::Done | Self::Rejected => None,
        }
    }
}

/// Coarse outcome of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Status {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl Status {
    /// The string form returned by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Complaint model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "complaint")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Free-form category label.
    pub category: String,

    /// The user who submitted the complaint.
    pub created_by: String,

    /// Snapshot of the creator's role at creation time. Never re-derived,
    /// since the user's role could change afterwards.
    pub created_by_role: Role,

    /// Current owner of the complaint, or terminal position.
    pub stage: Stage,

    /// Coarse outcome.
    pub status: Status,

    /// Deadline for the current stage's response (HOD stage only).
    #[sea_orm(nullable)]
    pub response_due_at: Option<DateTimeWithTimeZone>,

    /// True once the escalation sweep has force-advanced this complaint.
    /// Sticky: never reset.
    #[sea_orm(default_value = false)]
    pub auto_forwarded: bool,

    /// Optimistic-concurrency guard, incremented on every transition.
    #[sea_orm(default_value = 0)]
    pub revision: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,

    #[sea_orm(has_many = "super::history_entry::Entity")]
    History,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::history_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ownership() {
        assert_eq!(Stage::Teacher.owning_role(), Some(Role::Teacher));
        assert_eq!(Stage::Hod.owning_role(), Some(Role::Hod));
        assert_eq!(Stage::Principal.owning_role(), Some(Role::Principal));
        assert_eq!(Stage::Done.owning_role(), None);
        assert_eq!(Stage::Rejected.owning_role(), None);
    }

    #[test]
    fn test_active_stages() {
        assert!(Stage::Teacher.is_active());
        assert!(Stage::Hod.is_active());
        assert!(Stage::Principal.is_active());
        assert!(!Stage::Done.is_active());
        assert!(!Stage::Rejected.is_active());
    }
}
