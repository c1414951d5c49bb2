//! Read-side projections.
//!
//! Pure derivations computed from a complaint and its history ledger. Nothing
//! here mutates state; the functions take already-loaded models and produce
//! consumer-facing views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grievance_db::entities::{
    complaint,
    complaint::{Stage, Status},
    history_entry,
    history_entry::HistoryAction,
    user,
};
use serde::Serialize;

/// Seconds in a day, for deadline arithmetic.
const DAY_SECS: i64 = 86_400;

/// A user reference resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: user::Role,
}

impl From<&user::Model> for ActorView {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
        }
    }
}

/// A ledger entry with its actor resolved for display.
///
/// The role/email snapshots always come from the entry itself, never from
/// the resolved actor record: the snapshots reflect the role at the time of
/// the action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    pub action: HistoryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorView>,
    pub actor_role: String,
    pub actor_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl HistoryEntryView {
    /// Compose an entry view, joining the actor from a pre-loaded lookup.
    #[must_use]
    pub fn compose(
        entry: &history_entry::Model,
        actors: &BTreeMap<String, user::Model>,
    ) -> Self {
        let actor = entry
            .actor_id
            .as_ref()
            .and_then(|id| actors.get(id))
            .map(ActorView::from);

        Self {
            action: entry.action,
            actor,
            actor_role: entry.actor_role.clone(),
            actor_email: entry.actor_email.clone(),
            comment: entry.comment.clone(),
            reason: entry.reason.clone(),
            at: entry.created_at.with_timezone(&Utc),
        }
    }
}

/// How much time is left before the response deadline lapses.
///
/// `days_left` is `ceil((due - now) / 1 day)`, floored at 0 once overdue.
/// Both fields are empty/false when no deadline is set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineView {
    pub days_left: Option<i64>,
    pub is_overdue: bool,
}

/// Compute the deadline view for an optional due timestamp.
#[must_use]
pub fn deadline_view(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DeadlineView {
    let Some(due) = due else {
        return DeadlineView::default();
    };

    let secs = (due - now).num_seconds();
    if secs <= 0 {
        DeadlineView {
            days_left: Some(0),
            is_overdue: true,
        }
    } else {
        DeadlineView {
            days_left: Some(((secs as u64).div_ceil(DAY_SECS as u64)) as i64),
            is_overdue: false,
        }
    }
}

/// The stage awaiting action, or `None` once the complaint is terminal.
#[must_use]
pub fn current_pending_stage(c: &complaint::Model) -> Option<Stage> {
    if c.status == Status::Pending {
        Some(c.stage)
    } else {
        None
    }
}

/// Map each role to its latest stated reason for the given action.
///
/// A role maps to `None` when it acted without stating a reason; roles that
/// never acted are absent entirely. Later entries overwrite earlier ones, so
/// the latest decision per role wins.
#[must_use]
pub fn reasons_by_role(
    entries: &[history_entry::Model],
    action: HistoryAction,
) -> BTreeMap<String, Option<String>> {
    let mut reasons = BTreeMap::new();
    for entry in entries {
        if entry.action == action {
            reasons.insert(entry.actor_role.clone(), entry.reason.clone());
        }
    }
    reasons
}

/// Find the first rejection recorded strictly after the given timestamp.
#[must_use]
pub fn rejection_after<'a>(
    entries: &'a [history_entry::Model],
    after: &DateTime<Utc>,
) -> Option<&'a history_entry::Model> {
    entries
        .iter()
        .find(|e| e.action == HistoryAction::Rejected && e.created_at.with_timezone(&Utc) > *after)
}

/// Whether the ledger records an automatic escalation past the HOD stage.
#[must_use]
pub fn was_auto_forwarded(entries: &[history_entry::Model]) -> bool {
    entries
        .iter()
        .any(|e| e.action == HistoryAction::AutoForwarded)
}
