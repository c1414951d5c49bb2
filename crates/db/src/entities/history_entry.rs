//! History entry entity.
//!
//! The append-only audit ledger for complaints. Entries are never edited or
//! removed once written.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Action recorded in a complaint's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum HistoryAction {
    #[sea_orm(string_value = "created")]
    #[serde(rename = "created")]
    Created,
    #[sea_orm(string_value = "forwarded")]
    #[serde(rename = "forwarded")]
    Forwarded,
    #[sea_orm(string_value = "approved")]
    #[serde(rename = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    #[serde(rename = "rejected")]
    Rejected,
    #[sea_orm(string_value = "commented")]
    #[serde(rename = "commented")]
    Commented,
    #[sea_orm(string_value = "auto-forwarded")]
    #[serde(rename = "auto-forwarded")]
    AutoForwarded,
}

impl HistoryAction {
    /// The string form returned by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Forwarded => "forwarded",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Commented => "commented",
            Self::AutoForwarded => "auto-forwarded",
        }
    }
}

/// History entry model.
///
/// `actor_role` and `actor_email` are denormalized snapshots taken at the
/// time of the action. They are never re-derived from the live user record,
/// since roles and emails can change after the fact.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "history_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub complaint_id: String,

    /// Acting user; None for system-originated entries (auto-forward).
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    /// Role snapshot; `"system"` for auto-forward entries.
    pub actor_role: String,

    /// Email snapshot for display.
    pub actor_email: String,

    pub action: HistoryAction,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,

    /// Per-complaint insertion order. The `created` entry is always seq 0.
    pub seq: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::complaint::Entity",
        from = "Column::ComplaintId",
        to = "super::complaint::Column::Id",
        on_delete = "Cascade"
    )]
    Complaint,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Actor,
}

impl Related<super::complaint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Complaint.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
