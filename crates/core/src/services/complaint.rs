//! Complaint service: the approval-chain stage machine and its read views.
//!
//! A complaint walks a fixed chain (teacher → HOD → principal). Every
//! accepted transition appends exactly one ledger entry and advances the
//! stage/status pair atomically, guarded by the complaint's revision so two
//! racing transitions can never both apply.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use grievance_common::{AppError, AppResult, IdGenerator};
use grievance_db::{
    entities::{
        complaint,
        complaint::{Stage, Status},
        history_entry,
        history_entry::HistoryAction,
        user,
        user::Role,
    },
    repositories::{ComplaintRepository, HistoryRepository, TransitionUpdate, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::notification::NotificationService;
use crate::services::projection::{self, ActorView, DeadlineView, HistoryEntryView};

/// Role snapshot recorded on system-originated ledger entries.
const SYSTEM_ROLE: &str = "system";
/// Email snapshot recorded on system-originated ledger entries.
const SYSTEM_EMAIL: &str = "system@auto";

/// How many ledger entries the recent-activity view scans before deduping
/// down to complaints.
const RECENT_ACTIVITY_WINDOW: u64 = 100;

/// Input for creating a complaint.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComplaintInput {
    #[validate(length(min = 1, max = 512))]
    pub title: String,

    #[validate(length(min = 1, max = 10_000))]
    pub description: String,

    #[validate(length(min = 1, max = 128))]
    pub category: Option<String>,
}

/// A complaint decorated with its read-side projections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintOverview {
    #[serde(flatten)]
    pub complaint: complaint::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_user: Option<ActorView>,
    /// Latest stated approval reason per role; roles that never approved are
    /// absent.
    pub approval_reasons: BTreeMap<String, Option<String>>,
    /// Latest stated rejection reason per role; roles that never rejected
    /// are absent.
    pub rejection_reasons: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_pending_stage: Option<Stage>,
    #[serde(flatten)]
    pub deadline: DeadlineView,
}

/// A complaint with its full ledger, actors resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintTrack {
    #[serde(flatten)]
    pub complaint: complaint::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_user: Option<ActorView>,
    pub history: Vec<HistoryEntryView>,
}

/// A complaint the caller acted on, with the caller's own ledger entry
/// surfaced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActedByMeView {
    #[serde(flatten)]
    pub overview: ComplaintOverview,
    pub acted_at: DateTime<Utc>,
    pub my_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_comment: Option<String>,
    /// True when the HOD stage was skipped by the escalation sweep rather
    /// than decided by a person.
    pub hod_stage_auto_forwarded: bool,
}

/// A complaint the caller approved that a later stage rejected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaterRejectedView {
    #[serde(flatten)]
    pub overview: ComplaintOverview,
    pub approved_at: DateTime<Utc>,
    pub my_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub rejected_by_role: String,
    pub rejected_by_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Aggregate workflow counters for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub auto_forwarded: u64,
    /// How many rejections each role issued.
    pub rejected_by_role: BTreeMap<String, u64>,
}

/// The stage a role reviews, if any.
const fn stage_for_role(role: Role) -> Option<Stage> {
    match role {
        Role::Teacher => Some(Stage::Teacher),
        Role::Hod => Some(Stage::Hod),
        Role::Principal => Some(Stage::Principal),
        Role::Student | Role::Admin => None,
    }
}

/// Where a freshly created complaint starts, given the creator's role
/// snapshot. Teachers' complaints skip the teacher stage and go straight to
/// the HOD with a response deadline.
fn initial_placement(
    creator_role: Role,
    now: DateTime<Utc>,
    hod_response_days: i64,
) -> (Stage, Option<DateTime<Utc>>) {
    if creator_role == Role::Teacher {
        (Stage::Hod, Some(now + Duration::days(hod_response_days)))
    } else {
        (Stage::Teacher, None)
    }
}

/// The row changes an accepted approval applies, or `None` when the
/// complaint is already terminal.
fn advance_on_approve(
    stage: Stage,
    now: DateTime<Utc>,
    hod_response_days: i64,
) -> Option<TransitionUpdate> {
    match stage {
        Stage::Teacher => Some(TransitionUpdate {
            stage: Stage::Hod,
            status: Status::Pending,
            response_due_at: Some(now + Duration::days(hod_response_days)),
            auto_forwarded: None,
        }),
        Stage::Hod => Some(TransitionUpdate {
            stage: Stage::Principal,
            status: Status::Pending,
            response_due_at: None,
            auto_forwarded: None,
        }),
        Stage::Principal => Some(TransitionUpdate {
            stage: Stage::Done,
            status: Status::Approved,
            response_due_at: None,
            auto_forwarded: None,
        }),
        Stage::Done | Stage::Rejected => None,
    }
}

/// Complaint service for business logic.
#[derive(Clone)]
pub struct ComplaintService {
    complaint_repo: ComplaintRepository,
    history_repo: HistoryRepository,
    user_repo: UserRepository,
    notifications: NotificationService,
    hod_response_days: i64,
    id_gen: IdGenerator,
}

impl ComplaintService {
    /// Create a new complaint service.
    #[must_use]
    pub const fn new(
        complaint_repo: ComplaintRepository,
        history_repo: HistoryRepository,
        user_repo: UserRepository,
        notifications: NotificationService,
        hod_response_days: i64,
    ) -> Self {
        Self {
            complaint_repo,
            history_repo,
            user_repo,
            notifications,
            hod_response_days,
            id_gen: IdGenerator::new(),
        }
    }

    // ========== Transitions ==========

    /// Create a complaint. Only students and teachers may raise one.
    pub async fn create(
        &self,
        creator: &user::Model,
        input: CreateComplaintInput,
    ) -> AppResult<complaint::Model> {
        input.validate()?;

        if !matches!(creator.role, Role::Student | Role::Teacher) {
            return Err(AppError::Forbidden(
                "Only students and teachers can raise complaints".to_string(),
            ));
        }

        let now = Utc::now();
        let (stage, due) = initial_placement(creator.role, now, self.hod_response_days);
        let id = self.id_gen.generate();

        let complaint_model = complaint::ActiveModel {
            id: Set(id.clone()),
            title: Set(input.title),
            description: Set(input.description.clone()),
            category: Set(input.category.unwrap_or_else(|| "other".to_string())),
            created_by: Set(creator.id.clone()),
            created_by_role: Set(creator.role),
            stage: Set(stage),
            status: Set(Status::Pending),
            response_due_at: Set(due.map(Into::into)),
            auto_forwarded: Set(false),
            revision: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let entry = history_entry::ActiveModel {
            id: Set(self.id_gen.generate()),
            complaint_id: Set(id),
            actor_id: Set(Some(creator.id.clone())),
            actor_role: Set(creator.role.as_str().to_string()),
            actor_email: Set(creator.email.clone()),
            action: Set(HistoryAction::Created),
            comment: Set(Some(input.description)),
            reason: Set(None),
            seq: Set(0),
            created_at: Set(now.into()),
        };

        self.complaint_repo
            .create_with_history(complaint_model, entry)
            .await
    }

    /// Approve at the current stage and advance the chain.
    pub async fn approve(
        &self,
        id: &str,
        actor: &user::Model,
        reason: Option<String>,
    ) -> AppResult<complaint::Model> {
        let complaint = self.complaint_repo.get_by_id(id).await?;
        Self::ensure_owns_stage(actor, &complaint)?;

        let now = Utc::now();
        let update = advance_on_approve(complaint.stage, now, self.hod_response_days)
            .ok_or_else(|| AppError::Forbidden("Complaint is already closed".to_string()))?;

        let reason = normalize(reason);
        let entry = self.actor_entry(
            &complaint,
            actor,
            HistoryAction::Approved,
            None,
            reason.clone(),
            now,
        );

        let updated = self
            .complaint_repo
            .apply_transition(id, complaint.revision, update, entry)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Complaint was modified concurrently".to_string())
            })?;

        let reason_text = reason
            .map(|r| format!(" with reason: {r}"))
            .unwrap_or_default();
        self.try_notify(
            &complaint.created_by,
            format!(
                "Your complaint \"{}\" was approved by {} ({}){}.",
                complaint.title,
                actor.role.as_str(),
                actor.email,
                reason_text
            ),
        )
        .await;

        Ok(updated)
    }

    /// Reject at the current stage. Terminal: the complaint never returns to
    /// an earlier stage.
    pub async fn reject(
        &self,
        id: &str,
        actor: &user::Model,
        reason: &str,
    ) -> AppResult<complaint::Model> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("Reject reason required".to_string()));
        }

        let complaint = self.complaint_repo.get_by_id(id).await?;
        Self::ensure_owns_stage(actor, &complaint)?;

        let now = Utc::now();
        let update = TransitionUpdate {
            stage: Stage::Rejected,
            status: Status::Rejected,
            response_due_at: None,
            auto_forwarded: None,
        };
        let entry = self.actor_entry(
            &complaint,
            actor,
            HistoryAction::Rejected,
            None,
            Some(reason.to_string()),
            now,
        );

        let updated = self
            .complaint_repo
            .apply_transition(id, complaint.revision, update, entry)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Complaint was modified concurrently".to_string())
            })?;

        self.try_notify(
            &complaint.created_by,
            format!(
                "Your complaint \"{}\" was rejected by {} ({}): {reason}",
                complaint.title,
                actor.role.as_str(),
                actor.email
            ),
        )
        .await;

        Ok(updated)
    }

    /// Append a comment without changing stage, status, or deadline.
    pub async fn comment(
        &self,
        id: &str,
        actor: &user::Model,
        comment: &str,
    ) -> AppResult<complaint::Model> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(AppError::Validation("Comment required".to_string()));
        }

        let complaint = self.complaint_repo.get_by_id(id).await?;
        let allowed = complaint.created_by == actor.id || actor.role == Role::Admin;
        if !allowed {
            return Err(AppError::Forbidden(
                "Only the creator or an admin can comment".to_string(),
            ));
        }

        let now = Utc::now();
        // Stage, status and deadline are carried through unchanged; the
        // revision still advances so racing transitions serialize.
        let update = TransitionUpdate {
            stage: complaint.stage,
            status: complaint.status,
            response_due_at: complaint.response_due_at.map(|d| d.with_timezone(&Utc)),
            auto_forwarded: None,
        };
        let entry = self.actor_entry(
            &complaint,
            actor,
            HistoryAction::Commented,
            Some(comment.to_string()),
            None,
            now,
        );

        let updated = self
            .complaint_repo
            .apply_transition(id, complaint.revision, update, entry)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Complaint was modified concurrently".to_string())
            })?;

        self.try_notify(
            &complaint.created_by,
            format!("New comment on \"{}\"", complaint.title),
        )
        .await;

        Ok(updated)
    }

    /// Force-advance a stalled complaint past the HOD stage. System-only:
    /// invoked by the escalation sweep, never by a user actor, so no
    /// stage-ownership check applies.
    ///
    /// The precondition (stage HOD, pending, deadline lapsed, not yet
    /// auto-forwarded) is checked on the fetched model and re-verified at
    /// write time by the revision guard. Returns `Ok(None)` when the
    /// complaint no longer qualifies, e.g. a human decided it in the
    /// meantime.
    pub async fn auto_forward(
        &self,
        complaint: &complaint::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Option<complaint::Model>> {
        let Some(due) = complaint.response_due_at else {
            return Ok(None);
        };

        let eligible = complaint.stage == Stage::Hod
            && complaint.status == Status::Pending
            && due.with_timezone(&Utc) <= now
            && !complaint.auto_forwarded;
        if !eligible {
            return Ok(None);
        }

        let update = TransitionUpdate {
            stage: Stage::Principal,
            status: Status::Pending,
            response_due_at: None,
            auto_forwarded: Some(true),
        };
        let entry = history_entry::ActiveModel {
            id: Set(self.id_gen.generate()),
            complaint_id: Set(complaint.id.clone()),
            actor_id: Set(None),
            actor_role: Set(SYSTEM_ROLE.to_string()),
            actor_email: Set(SYSTEM_EMAIL.to_string()),
            action: Set(HistoryAction::AutoForwarded),
            comment: Set(Some(format!(
                "Auto-forwarded after HOD no-response till {}",
                due.to_rfc3339()
            ))),
            reason: Set(None),
            seq: Set(complaint.revision + 1),
            created_at: Set(now.into()),
        };

        let Some(updated) = self
            .complaint_repo
            .apply_transition(&complaint.id, complaint.revision, update, entry)
            .await?
        else {
            // A concurrent approval or rejection won; the sweep skips it.
            return Ok(None);
        };

        if let Err(e) = self
            .notifications
            .notify_role(
                Role::Principal,
                &format!(
                    "Complaint \"{}\" was auto-forwarded to Principal (no HOD response).",
                    complaint.title
                ),
            )
            .await
        {
            tracing::warn!(error = %e, complaint_id = %complaint.id, "Failed to notify principals");
        }

        self.try_notify(
            &complaint.created_by,
            format!(
                "Your complaint \"{}\" was auto-forwarded to Principal because HOD didn't respond in time.",
                complaint.title
            ),
        )
        .await;

        Ok(Some(updated))
    }

    // ========== Read views ==========

    /// The caller's inbox: pending complaints awaiting their role.
    ///
    /// Admins see all pending complaints; reviewer roles see the ones at
    /// their stage; everyone else sees an empty inbox.
    pub async fn inbox(
        &self,
        viewer: &user::Model,
        category: Option<&str>,
    ) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = match viewer.role {
            Role::Admin => self.complaint_repo.find_all_pending(category).await?,
            role => match stage_for_role(role) {
                Some(stage) => {
                    self.complaint_repo
                        .find_pending_by_stage(stage, category)
                        .await?
                }
                None => return Ok(Vec::new()),
            },
        };

        self.compose_overviews(complaints).await
    }

    /// Complaints created by the caller.
    pub async fn mine(&self, viewer: &user::Model) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = self.complaint_repo.find_by_creator(&viewer.id).await?;
        self.compose_overviews(complaints).await
    }

    /// A single complaint with its ledger. Visible to the creator and
    /// admins.
    pub async fn get_detail(&self, id: &str, viewer: &user::Model) -> AppResult<ComplaintTrack> {
        let complaint = self.complaint_repo.get_by_id(id).await?;
        let allowed = complaint.created_by == viewer.id || viewer.role == Role::Admin;
        if !allowed {
            return Err(AppError::Forbidden(
                "Not allowed to view this complaint".to_string(),
            ));
        }

        self.compose_track(complaint).await
    }

    /// Track a complaint through the chain. Visible to the creator and any
    /// reviewer or admin role.
    pub async fn track(&self, id: &str, viewer: &user::Model) -> AppResult<ComplaintTrack> {
        let complaint = self.complaint_repo.get_by_id(id).await?;
        let allowed = complaint.created_by == viewer.id
            || viewer.role.is_reviewer()
            || viewer.role == Role::Admin;
        if !allowed {
            return Err(AppError::Forbidden(
                "Not allowed to track this complaint".to_string(),
            ));
        }

        self.compose_track(complaint).await
    }

    /// Complaints the caller approved (forwarded up the chain).
    pub async fn forwarded_by_me(&self, viewer: &user::Model) -> AppResult<Vec<ActedByMeView>> {
        self.acted_by_me(viewer, HistoryAction::Approved).await
    }

    /// Complaints the caller rejected.
    pub async fn rejected_by_me(&self, viewer: &user::Model) -> AppResult<Vec<ActedByMeView>> {
        self.acted_by_me(viewer, HistoryAction::Rejected).await
    }

    /// Complaints whose ledger credits the caller with an automatic
    /// escalation. Auto-forward entries carry no actor, so this is normally
    /// empty; kept for API parity.
    pub async fn auto_forwarded_by_me(
        &self,
        viewer: &user::Model,
    ) -> AppResult<Vec<ActedByMeView>> {
        self.acted_by_me(viewer, HistoryAction::AutoForwarded).await
    }

    /// Complaints the caller approved that a later stage then rejected.
    pub async fn approvals_later_rejected(
        &self,
        viewer: &user::Model,
    ) -> AppResult<Vec<LaterRejectedView>> {
        let my_approvals = self
            .history_repo
            .find_by_actor_and_action(&viewer.id, HistoryAction::Approved)
            .await?;

        let ids = dedup_complaint_ids(&my_approvals);
        let complaints = self.complaint_repo.find_by_ids(&ids).await?;
        let rejected: Vec<_> = complaints
            .into_iter()
            .filter(|c| c.status == Status::Rejected)
            .collect();

        let mut approvals_by_complaint: BTreeMap<&str, &history_entry::Model> = BTreeMap::new();
        for e in &my_approvals {
            approvals_by_complaint
                .entry(e.complaint_id.as_str())
                .or_insert(e);
        }

        let ledgers = self
            .ledgers_for(&rejected.iter().map(|c| c.id.clone()).collect::<Vec<_>>())
            .await?;
        let overviews = self.compose_overviews(rejected).await?;

        let mut views = Vec::new();
        for overview in overviews {
            let Some(my_entry) = approvals_by_complaint.get(overview.complaint.id.as_str()) else {
                continue;
            };
            let empty = Vec::new();
            let ledger = ledgers.get(&overview.complaint.id).unwrap_or(&empty);
            let approved_at = my_entry.created_at.with_timezone(&Utc);
            let Some(rejection) = projection::rejection_after(ledger, &approved_at) else {
                continue;
            };

            views.push(LaterRejectedView {
                approved_at,
                my_role: my_entry.actor_role.clone(),
                approval_reason: my_entry.reason.clone(),
                rejected_at: rejection.created_at.with_timezone(&Utc),
                rejected_by_role: rejection.actor_role.clone(),
                rejected_by_email: rejection.actor_email.clone(),
                rejection_reason: rejection.reason.clone(),
                overview,
            });
        }

        Ok(views)
    }

    /// Admin listing: a page of all complaints, newest first.
    pub async fn list_page(&self, limit: u64, offset: u64) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = self.complaint_repo.find_page(limit, offset).await?;
        self.compose_overviews(complaints).await
    }

    /// Admin listing: complaints by the creator's role snapshot.
    pub async fn list_by_creator_role(&self, role: Role) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = self.complaint_repo.find_by_created_by_role(role).await?;
        self.compose_overviews(complaints).await
    }

    /// Admin listing: all pending complaints.
    pub async fn list_pending(&self) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = self.complaint_repo.find_all_pending(None).await?;
        self.compose_overviews(complaints).await
    }

    /// Admin listing: all completed complaints (approved or rejected).
    pub async fn list_completed(&self) -> AppResult<Vec<ComplaintOverview>> {
        let complaints = self.complaint_repo.find_completed().await?;
        self.compose_overviews(complaints).await
    }

    /// Admin listing: the complaints with the most recent ledger activity,
    /// most recently touched first.
    pub async fn recent_activity(&self, limit: usize) -> AppResult<Vec<ComplaintOverview>> {
        let entries = self.history_repo.find_recent(RECENT_ACTIVITY_WINDOW).await?;

        let mut ids = dedup_complaint_ids(&entries);
        ids.truncate(limit);

        let complaints = self.complaint_repo.find_by_ids(&ids).await?;
        let mut overviews = self.compose_overviews(complaints).await?;

        let position: BTreeMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        overviews.sort_by_key(|o| {
            position
                .get(o.complaint.id.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });

        Ok(overviews)
    }

    /// Aggregate workflow counters.
    pub async fn stats(&self) -> AppResult<WorkflowStats> {
        let total = self.complaint_repo.count_total().await?;
        let pending = self.complaint_repo.count_by_status(Status::Pending).await?;
        let approved = self
            .complaint_repo
            .count_by_status(Status::Approved)
            .await?;
        let rejected = self
            .complaint_repo
            .count_by_status(Status::Rejected)
            .await?;
        let auto_forwarded = self.complaint_repo.count_auto_forwarded().await?;

        // Rejection is terminal, so every rejected entry maps to exactly one
        // rejected complaint.
        let mut rejected_by_role: BTreeMap<String, u64> = BTreeMap::new();
        for entry in self
            .history_repo
            .find_by_action(HistoryAction::Rejected)
            .await?
        {
            *rejected_by_role.entry(entry.actor_role).or_insert(0) += 1;
        }

        Ok(WorkflowStats {
            total,
            pending,
            approved,
            rejected,
            auto_forwarded,
            rejected_by_role,
        })
    }

    // ========== Internals ==========

    /// Require that the actor's role owns the complaint's current stage.
    fn ensure_owns_stage(actor: &user::Model, complaint: &complaint::Model) -> AppResult<()> {
        let owner = complaint.stage.owning_role();
        if owner == Some(actor.role) {
            Ok(())
        } else {
            match owner {
                Some(role) => Err(AppError::Forbidden(format!(
                    "Complaint is awaiting the {} stage",
                    role.as_str()
                ))),
                None => Err(AppError::Forbidden(
                    "Complaint is already closed".to_string(),
                )),
            }
        }
    }

    /// Build a ledger entry for a user-initiated action, snapshotting the
    /// actor's role and email.
    fn actor_entry(
        &self,
        complaint: &complaint::Model,
        actor: &user::Model,
        action: HistoryAction,
        comment: Option<String>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> history_entry::ActiveModel {
        history_entry::ActiveModel {
            id: Set(self.id_gen.generate()),
            complaint_id: Set(complaint.id.clone()),
            actor_id: Set(Some(actor.id.clone())),
            actor_role: Set(actor.role.as_str().to_string()),
            actor_email: Set(actor.email.clone()),
            action: Set(action),
            comment: Set(comment),
            reason: Set(reason),
            seq: Set(complaint.revision + 1),
            created_at: Set(now.into()),
        }
    }

    /// Record a notification, logging instead of failing the transition when
    /// the sink is unavailable.
    async fn try_notify(&self, user_id: &str, body: String) {
        if let Err(e) = self.notifications.notify(user_id, &body).await {
            tracing::warn!(error = %e, user_id, "Failed to record notification");
        }
    }

    /// Load the ledgers for a set of complaints, grouped by complaint ID.
    async fn ledgers_for(
        &self,
        ids: &[String],
    ) -> AppResult<BTreeMap<String, Vec<history_entry::Model>>> {
        let entries = self.history_repo.find_by_complaints(ids).await?;
        let mut by_complaint: BTreeMap<String, Vec<history_entry::Model>> = BTreeMap::new();
        for entry in entries {
            by_complaint
                .entry(entry.complaint_id.clone())
                .or_default()
                .push(entry);
        }
        Ok(by_complaint)
    }

    /// Decorate complaints with their projections and resolved creators.
    async fn compose_overviews(
        &self,
        complaints: Vec<complaint::Model>,
    ) -> AppResult<Vec<ComplaintOverview>> {
        let ids: Vec<String> = complaints.iter().map(|c| c.id.clone()).collect();
        let ledgers = self.ledgers_for(&ids).await?;

        let creator_ids = dedup(complaints.iter().map(|c| c.created_by.clone()));
        let creators: BTreeMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&creator_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let now = Utc::now();
        let empty = Vec::new();

        Ok(complaints
            .into_iter()
            .map(|c| {
                let ledger = ledgers.get(&c.id).unwrap_or(&empty);
                let deadline = projection::deadline_view(
                    c.response_due_at.map(|d| d.with_timezone(&Utc)),
                    now,
                );

                ComplaintOverview {
                    created_by_user: creators.get(&c.created_by).map(ActorView::from),
                    approval_reasons: projection::reasons_by_role(
                        ledger,
                        HistoryAction::Approved,
                    ),
                    rejection_reasons: projection::reasons_by_role(
                        ledger,
                        HistoryAction::Rejected,
                    ),
                    current_pending_stage: projection::current_pending_stage(&c),
                    deadline,
                    complaint: c,
                }
            })
            .collect())
    }

    /// Compose the full-ledger view of a single complaint.
    async fn compose_track(&self, complaint: complaint::Model) -> AppResult<ComplaintTrack> {
        let ledger = self.history_repo.find_by_complaint(&complaint.id).await?;

        let mut actor_ids: Vec<String> =
            ledger.iter().filter_map(|e| e.actor_id.clone()).collect();
        actor_ids.push(complaint.created_by.clone());
        let actors: BTreeMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&dedup(actor_ids.into_iter()))
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let history = ledger
            .iter()
            .map(|e| HistoryEntryView::compose(e, &actors))
            .collect();

        Ok(ComplaintTrack {
            created_by_user: actors.get(&complaint.created_by).map(ActorView::from),
            history,
            complaint,
        })
    }

    /// Shared body of the acted-on-by-me views.
    async fn acted_by_me(
        &self,
        viewer: &user::Model,
        action: HistoryAction,
    ) -> AppResult<Vec<ActedByMeView>> {
        let my_entries = self
            .history_repo
            .find_by_actor_and_action(&viewer.id, action)
            .await?;

        let ids = dedup_complaint_ids(&my_entries);
        let complaints = self.complaint_repo.find_by_ids(&ids).await?;
        let ledgers = self.ledgers_for(&ids).await?;

        let mut entries_by_complaint: BTreeMap<&str, &history_entry::Model> = BTreeMap::new();
        for e in &my_entries {
            entries_by_complaint
                .entry(e.complaint_id.as_str())
                .or_insert(e);
        }

        let overviews = self.compose_overviews(complaints).await?;
        let empty = Vec::new();

        Ok(overviews
            .into_iter()
            .filter_map(|overview| {
                let my_entry = entries_by_complaint.get(overview.complaint.id.as_str())?;
                let ledger = ledgers.get(&overview.complaint.id).unwrap_or(&empty);

                Some(ActedByMeView {
                    acted_at: my_entry.created_at.with_timezone(&Utc),
                    my_role: my_entry.actor_role.clone(),
                    my_reason: my_entry.reason.clone(),
                    my_comment: my_entry.comment.clone(),
                    hod_stage_auto_forwarded: projection::was_auto_forwarded(ledger),
                    overview,
                })
            })
            .collect())
    }
}

/// Trim an optional string, dropping it entirely when blank.
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Dedup while preserving first-seen order.
fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

fn dedup_complaint_ids(entries: &[history_entry::Model]) -> Vec<String> {
    dedup(entries.iter().map(|e| e.complaint_id.clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use grievance_db::repositories::NotificationRepository;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn test_user(id: &str, role: Role) -> user::Model {
        user::Model {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.edu"),
            password_hash: "$argon2id$test".to_string(),
            role,
            teacher_id: None,
            token: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn test_complaint(id: &str, stage: Stage, status: Status) -> complaint::Model {
        complaint::Model {
            id: id.to_string(),
            title: "Leaking roof".to_string(),
            description: "Water drips onto the back benches".to_string(),
            category: "infrastructure".to_string(),
            created_by: "student1".to_string(),
            created_by_role: Role::Student,
            stage,
            status,
            response_due_at: None,
            auto_forwarded: false,
            revision: 1,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service_with(db: sea_orm::DatabaseConnection) -> ComplaintService {
        let db = Arc::new(db);
        ComplaintService::new(
            ComplaintRepository::new(Arc::clone(&db)),
            HistoryRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
            NotificationService::new(
                NotificationRepository::new(Arc::clone(&db)),
                UserRepository::new(db),
            ),
            3,
        )
    }

    // ----- pure stage machine -----

    #[test]
    fn test_initial_placement_student_starts_at_teacher() {
        let now = Utc::now();
        let (stage, due) = initial_placement(Role::Student, now, 3);
        assert_eq!(stage, Stage::Teacher);
        assert!(due.is_none());
    }

    #[test]
    fn test_initial_placement_teacher_skips_to_hod_with_deadline() {
        let now = Utc::now();
        let (stage, due) = initial_placement(Role::Teacher, now, 3);
        assert_eq!(stage, Stage::Hod);
        assert_eq!(due, Some(now + Duration::days(3)));
    }

    #[test]
    fn test_advance_on_approve_walks_the_chain() {
        let now = Utc::now();

        let step = advance_on_approve(Stage::Teacher, now, 3).unwrap();
        assert_eq!(step.stage, Stage::Hod);
        assert_eq!(step.status, Status::Pending);
        assert_eq!(step.response_due_at, Some(now + Duration::days(3)));

        let step = advance_on_approve(Stage::Hod, now, 3).unwrap();
        assert_eq!(step.stage, Stage::Principal);
        assert_eq!(step.status, Status::Pending);
        assert!(step.response_due_at.is_none());

        let step = advance_on_approve(Stage::Principal, now, 3).unwrap();
        assert_eq!(step.stage, Stage::Done);
        assert_eq!(step.status, Status::Approved);
        assert!(step.response_due_at.is_none());
    }

    #[test]
    fn test_three_approvals_walk_to_done() {
        let now = Utc::now();
        let mut stage = Stage::Teacher;
        let mut status = Status::Pending;
        let mut steps = 0;

        while let Some(update) = advance_on_approve(stage, now, 3) {
            stage = update.stage;
            status = update.status;
            steps += 1;
        }

        assert_eq!(steps, 3);
        assert_eq!(stage, Stage::Done);
        assert_eq!(status, Status::Approved);
    }

    #[test]
    fn test_advance_on_approve_terminal_stages() {
        let now = Utc::now();
        assert!(advance_on_approve(Stage::Done, now, 3).is_none());
        assert!(advance_on_approve(Stage::Rejected, now, 3).is_none());
    }

    #[test]
    fn test_ensure_owns_stage_matches_role_to_stage() {
        for (stage, role) in [
            (Stage::Teacher, Role::Teacher),
            (Stage::Hod, Role::Hod),
            (Stage::Principal, Role::Principal),
        ] {
            let c = test_complaint("c1", stage, Status::Pending);
            assert!(ComplaintService::ensure_owns_stage(&test_user("u", role), &c).is_ok());

            // Every other reviewer role is forbidden at this stage.
            for other in [Role::Teacher, Role::Hod, Role::Principal] {
                if other != role {
                    let err =
                        ComplaintService::ensure_owns_stage(&test_user("u", other), &c);
                    assert!(matches!(err, Err(AppError::Forbidden(_))));
                }
            }
        }
    }

    #[test]
    fn test_ensure_owns_stage_terminal_is_forbidden() {
        let c = test_complaint("c1", Stage::Rejected, Status::Rejected);
        for role in [Role::Teacher, Role::Hod, Role::Principal, Role::Admin] {
            let err = ComplaintService::ensure_owns_stage(&test_user("u", role), &c);
            assert!(matches!(err, Err(AppError::Forbidden(_))));
        }
    }

    // ----- validation fails before any mutation -----

    #[tokio::test]
    async fn test_reject_without_reason_touches_nothing() {
        // An empty mock database: any query would fail the test.
        let service = service_with(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        );

        let actor = test_user("hod1", Role::Hod);
        let result = service.reject("c1", &actor, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_comment_without_text_touches_nothing() {
        let service = service_with(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        );

        let actor = test_user("student1", Role::Student);
        let result = service.comment("c1", &actor, "").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_requires_student_or_teacher() {
        let service = service_with(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        );

        for role in [Role::Hod, Role::Principal, Role::Admin] {
            let input = CreateComplaintInput {
                title: "t".to_string(),
                description: "d".to_string(),
                category: None,
            };
            let result = service.create(&test_user("u", role), input).await;
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }
    }

    #[tokio::test]
    async fn test_approve_wrong_stage_is_forbidden() {
        let complaint = test_complaint("c1", Stage::Hod, Status::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[complaint]])
            .into_connection();
        let service = service_with(db);

        let actor = test_user("teacher1", Role::Teacher);
        let result = service.approve("c1", &actor, None).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_approve_unknown_complaint_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<complaint::Model>::new()])
            .into_connection();
        let service = service_with(db);

        let actor = test_user("hod1", Role::Hod);
        let result = service.approve("missing", &actor, None).await;
        assert!(matches!(result, Err(AppError::ComplaintNotFound(_))));
    }

    // ----- recent activity -----

    fn ledger_entry(id: &str, complaint_id: &str, at: DateTime<Utc>) -> history_entry::Model {
        history_entry::Model {
            id: id.to_string(),
            complaint_id: complaint_id.to_string(),
            actor_id: Some("hod1".to_string()),
            actor_role: "hod".to_string(),
            actor_email: "hod1@example.edu".to_string(),
            action: HistoryAction::Approved,
            comment: None,
            reason: None,
            seq: 1,
            created_at: at.into(),
        }
    }

    #[tokio::test]
    async fn test_recent_activity_dedups_and_orders_by_latest_ledger_entry() {
        let now = Utc::now();
        // c2 was touched most recently and appears twice in the ledger scan.
        let entries = vec![
            ledger_entry("h3", "c2", now),
            ledger_entry("h2", "c1", now - Duration::hours(1)),
            ledger_entry("h1", "c2", now - Duration::hours(2)),
        ];
        // The complaint lookup returns creation order, not activity order.
        let complaints = vec![
            test_complaint("c1", Stage::Hod, Status::Pending),
            test_complaint("c2", Stage::Principal, Status::Pending),
        ];

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([entries])
            .append_query_results([complaints])
            .append_query_results([Vec::<history_entry::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let service = service_with(db);

        let result = service.recent_activity(3).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].complaint.id, "c2");
        assert_eq!(result[1].complaint.id, "c1");
    }

    // ----- auto-forward preconditions -----

    #[tokio::test]
    async fn test_auto_forward_escalates_overdue_hod_complaint() {
        use grievance_db::entities::notification;

        let now = Utc::now();
        let mut overdue = test_complaint("c1", Stage::Hod, Status::Pending);
        overdue.response_due_at = Some((now - Duration::days(1)).into());

        let mut escalated = test_complaint("c1", Stage::Principal, Status::Pending);
        escalated.auto_forwarded = true;
        escalated.revision = overdue.revision + 1;

        let appended_entry = history_entry::Model {
            action: HistoryAction::AutoForwarded,
            actor_id: None,
            actor_role: "system".to_string(),
            actor_email: "system@auto".to_string(),
            seq: overdue.revision + 1,
            ..ledger_entry("h2", "c1", now)
        };
        let notification = notification::Model {
            id: "n1".to_string(),
            user_id: "prin1".to_string(),
            body: "x".to_string(),
            is_read: false,
            created_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // Revision guard passes: one row updated.
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            // Ledger append, then the re-read inside the transaction.
            .append_query_results([[appended_entry]])
            .append_query_results([[escalated.clone()]])
            // Principal fan-out, then the creator notification.
            .append_query_results([[test_user("prin1", Role::Principal)]])
            .append_query_results([[notification.clone()]])
            .append_query_results([[notification]])
            .into_connection();
        let service = service_with(db);

        let updated = service.auto_forward(&overdue, now).await.unwrap().unwrap();
        assert_eq!(updated.stage, Stage::Principal);
        assert_eq!(updated.status, Status::Pending);
        assert!(updated.auto_forwarded);
        assert!(updated.response_due_at.is_none());
        assert_eq!(updated.revision, overdue.revision + 1);
    }

    #[tokio::test]
    async fn test_auto_forward_skips_ineligible_complaints() {
        let service = service_with(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        );
        let now = Utc::now();

        // No deadline at all.
        let c = test_complaint("c1", Stage::Hod, Status::Pending);
        assert!(service.auto_forward(&c, now).await.unwrap().is_none());

        // Deadline still in the future.
        let mut c = test_complaint("c2", Stage::Hod, Status::Pending);
        c.response_due_at = Some((now + Duration::days(1)).into());
        assert!(service.auto_forward(&c, now).await.unwrap().is_none());

        // Already escalated once.
        let mut c = test_complaint("c3", Stage::Hod, Status::Pending);
        c.response_due_at = Some((now - Duration::days(1)).into());
        c.auto_forwarded = true;
        assert!(service.auto_forward(&c, now).await.unwrap().is_none());

        // Already decided by a human.
        let mut c = test_complaint("c4", Stage::Rejected, Status::Rejected);
        c.response_due_at = Some((now - Duration::days(1)).into());
        assert!(service.auto_forward(&c, now).await.unwrap().is_none());
    }
}
