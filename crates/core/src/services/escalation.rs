//! Deadline escalation sweep.
//!
//! Finds complaints stuck at the HOD stage past their response deadline and
//! force-advances each one to the principal. The sweep is idempotent: every
//! escalation is guarded by the complaint's revision, and an already
//! escalated or already decided complaint is skipped rather than re-moved.

use chrono::{DateTime, Utc};
use grievance_common::AppResult;
use grievance_db::repositories::ComplaintRepository;

use crate::services::complaint::ComplaintService;

/// Batch size per sweep pass.
const SWEEP_BATCH: u64 = 200;

/// Escalation service driving the deadline sweep.
#[derive(Clone)]
pub struct EscalationService {
    complaint_repo: ComplaintRepository,
    complaints: ComplaintService,
}

impl EscalationService {
    /// Create a new escalation service.
    #[must_use]
    pub const fn new(complaint_repo: ComplaintRepository, complaints: ComplaintService) -> Self {
        Self {
            complaint_repo,
            complaints,
        }
    }

    /// Run one sweep pass against the given clock.
    ///
    /// Returns the number of complaints escalated. A failure on one
    /// complaint is logged and the sweep moves on, so one bad row cannot
    /// stall every other overdue complaint.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let due = self
            .complaint_repo
            .find_due_for_escalation(now, SWEEP_BATCH)
            .await?;

        let mut escalated = 0;
        for complaint in &due {
            match self.complaints.auto_forward(complaint, now).await {
                Ok(Some(_)) => {
                    tracing::info!(complaint_id = %complaint.id, "Auto-forwarded overdue complaint");
                    escalated += 1;
                }
                Ok(None) => {
                    // Lost the race to a human decision or a concurrent sweep.
                    tracing::debug!(complaint_id = %complaint.id, "Skipped, no longer eligible");
                }
                Err(e) => {
                    tracing::warn!(error = %e, complaint_id = %complaint.id, "Escalation failed");
                }
            }
        }

        Ok(escalated)
    }

    /// Run one sweep pass against the wall clock.
    pub async fn run_sweep(&self) -> AppResult<u64> {
        self.run_sweep_at(Utc::now()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use grievance_db::{
        entities::{
            complaint,
            complaint::{Stage, Status},
            user::Role,
        },
        repositories::{HistoryRepository, NotificationRepository, UserRepository},
    };
    use crate::services::NotificationService;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service_with(db: sea_orm::DatabaseConnection) -> EscalationService {
        let db = Arc::new(db);
        let complaint_repo = ComplaintRepository::new(Arc::clone(&db));
        let complaints = ComplaintService::new(
            ComplaintRepository::new(Arc::clone(&db)),
            HistoryRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
            NotificationService::new(
                NotificationRepository::new(Arc::clone(&db)),
                UserRepository::new(db),
            ),
            3,
        );
        EscalationService::new(complaint_repo, complaints)
    }

    fn overdue_complaint(id: &str, now: chrono::DateTime<Utc>) -> complaint::Model {
        complaint::Model {
            id: id.to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            category: "other".to_string(),
            created_by: "student1".to_string(),
            created_by_role: Role::Student,
            stage: Stage::Hod,
            status: Status::Pending,
            response_due_at: Some((now - Duration::days(1)).into()),
            auto_forwarded: false,
            revision: 1,
            created_at: now.into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_due() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<complaint::Model>::new()])
            .into_connection();

        let service = service_with(db);
        let escalated = service.run_sweep().await.unwrap();
        assert_eq!(escalated, 0);
    }

    #[tokio::test]
    async fn test_sweep_escalates_overdue_complaint() {
        use grievance_db::entities::{history_entry, history_entry::HistoryAction, notification, user};
        use sea_orm::MockExecResult;

        let now = Utc::now();
        let overdue = overdue_complaint("c1", now);

        let mut escalated = overdue.clone();
        escalated.stage = Stage::Principal;
        escalated.auto_forwarded = true;
        escalated.response_due_at = None;
        escalated.revision = overdue.revision + 1;

        let entry = history_entry::Model {
            id: "h2".to_string(),
            complaint_id: "c1".to_string(),
            actor_id: None,
            actor_role: "system".to_string(),
            actor_email: "system@auto".to_string(),
            action: HistoryAction::AutoForwarded,
            comment: Some("Auto-forwarded".to_string()),
            reason: None,
            seq: overdue.revision + 1,
            created_at: now.into(),
        };
        let principal = user::Model {
            id: "prin1".to_string(),
            name: "Principal".to_string(),
            email: "principal@example.edu".to_string(),
            password_hash: "$argon2id$test".to_string(),
            role: Role::Principal,
            teacher_id: None,
            token: None,
            created_at: now.into(),
            updated_at: None,
        };
        let notification = notification::Model {
            id: "n1".to_string(),
            user_id: "prin1".to_string(),
            body: "x".to_string(),
            is_read: false,
            created_at: now.into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[overdue]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[entry]])
            .append_query_results([[escalated]])
            .append_query_results([[principal]])
            .append_query_results([[notification.clone()]])
            .append_query_results([[notification]])
            .into_connection();

        let service = service_with(db);
        let escalated_count = service.run_sweep_at(now).await.unwrap();
        assert_eq!(escalated_count, 1);
    }

    #[tokio::test]
    async fn test_sweep_skips_rows_that_lost_the_race() {
        let now = Utc::now();
        // The query returns an overdue complaint, but by write time it was
        // already marked escalated. auto_forward sees the sticky flag and
        // declines without touching the database again.
        let mut stale = overdue_complaint("c1", now);
        stale.auto_forwarded = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[stale]])
            .into_connection();

        let service = service_with(db);
        let escalated = service.run_sweep_at(now).await.unwrap();
        assert_eq!(escalated, 0);
    }
}
