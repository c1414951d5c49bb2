//! Complaint repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};

use crate::entities::{
    Complaint, complaint,
    complaint::{Stage, Status},
    history_entry,
    user::Role,
};

/// Field changes applied by a single accepted transition.
///
/// `response_due_at` is always written (every transition decides the deadline
/// explicitly). `auto_forwarded` is only written when set, since the flag is
/// sticky and must never be reset by later transitions.
#[derive(Debug, Clone)]
pub struct TransitionUpdate {
    pub stage: Stage,
    pub status: Status,
    pub response_due_at: Option<DateTime<Utc>>,
    pub auto_forwarded: Option<bool>,
}

/// Complaint repository for database operations.
#[derive(Clone)]
pub struct ComplaintRepository {
    db: Arc<DatabaseConnection>,
}

impl ComplaintRepository {
    /// Create a new complaint repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a complaint by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<complaint::Model>> {
        Complaint::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a complaint by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<complaint::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ComplaintNotFound(id.to_string()))
    }

    /// Insert a new complaint together with its `created` ledger entry, as a
    /// single atomic unit.
    pub async fn create_with_history(
        &self,
        complaint_model: complaint::ActiveModel,
        entry: history_entry::ActiveModel,
    ) -> AppResult<complaint::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = complaint_model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        entry
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Apply a validated transition: conditionally update the complaint row
    /// (guarded on the expected revision) and append the ledger entry, as a
    /// single atomic unit.
    ///
    /// Returns `Ok(None)` when the revision guard trips, i.e. a concurrent
    /// transition won the race. Nothing is written in that case.
    pub async fn apply_transition(
        &self,
        complaint_id: &str,
        expected_revision: i32,
        update: TransitionUpdate,
        entry: history_entry::ActiveModel,
    ) -> AppResult<Option<complaint::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut stmt = Complaint::update_many()
            .filter(complaint::Column::Id.eq(complaint_id))
            .filter(complaint::Column::Revision.eq(expected_revision))
            .col_expr(complaint::Column::Stage, Expr::value(update.stage))
            .col_expr(complaint::Column::Status, Expr::value(update.status))
            .col_expr(
                complaint::Column::ResponseDueAt,
                Expr::value(update.response_due_at),
            )
            .col_expr(
                complaint::Column::Revision,
                Expr::col(complaint::Column::Revision).add(1),
            )
            .col_expr(complaint::Column::UpdatedAt, Expr::value(Some(Utc::now())));

        if let Some(auto_forwarded) = update.auto_forwarded {
            stmt = stmt.col_expr(complaint::Column::AutoForwarded, Expr::value(auto_forwarded));
        }

        let result = stmt
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(None);
        }

        entry
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Complaint::find_by_id(complaint_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::ComplaintNotFound(complaint_id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(updated))
    }

    /// Find pending complaints at a given stage, newest first.
    pub async fn find_pending_by_stage(
        &self,
        stage: Stage,
        category: Option<&str>,
    ) -> AppResult<Vec<complaint::Model>> {
        let mut query = Complaint::find()
            .filter(complaint::Column::Status.eq(Status::Pending))
            .filter(complaint::Column::Stage.eq(stage));

        if let Some(category) = category {
            query = query.filter(complaint::Column::Category.eq(category));
        }

        query
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all pending complaints, newest first.
    pub async fn find_all_pending(&self, category: Option<&str>) -> AppResult<Vec<complaint::Model>> {
        let mut query = Complaint::find().filter(complaint::Column::Status.eq(Status::Pending));

        if let Some(category) = category {
            query = query.filter(complaint::Column::Category.eq(category));
        }

        query
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find complaints created by a user, newest first.
    pub async fn find_by_creator(&self, user_id: &str) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::CreatedBy.eq(user_id))
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find complaints whose HOD response deadline has lapsed and that the
    /// escalation sweep has not yet acted on.
    pub async fn find_due_for_escalation(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::Stage.eq(Stage::Hod))
            .filter(complaint::Column::Status.eq(Status::Pending))
            .filter(complaint::Column::ResponseDueAt.lte(now))
            .filter(complaint::Column::AutoForwarded.eq(false))
            .order_by_asc(complaint::Column::ResponseDueAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find complaints by the role snapshot taken at creation time.
    pub async fn find_by_created_by_role(&self, role: Role) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::CreatedByRole.eq(role))
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find completed complaints (approved or rejected), newest first.
    pub async fn find_completed(&self) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .filter(
                complaint::Column::Status
                    .eq(Status::Approved)
                    .or(complaint::Column::Status.eq(Status::Rejected)),
            )
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a page of complaints, newest first.
    pub async fn find_page(&self, limit: u64, offset: u64) -> AppResult<Vec<complaint::Model>> {
        Complaint::find()
            .order_by_desc(complaint::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find complaints by a set of IDs, newest first.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<complaint::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Complaint::find()
            .filter(complaint::Column::Id.is_in(ids.iter().cloned()))
            .order_by_desc(complaint::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count all complaints.
    pub async fn count_total(&self) -> AppResult<u64> {
        Complaint::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count complaints with a given status.
    pub async fn count_by_status(&self, status: Status) -> AppResult<u64> {
        Complaint::find()
            .filter(complaint::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count complaints the escalation sweep has force-advanced.
    pub async fn count_auto_forwarded(&self) -> AppResult<u64> {
        Complaint::find()
            .filter(complaint::Column::AutoForwarded.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_complaint(id: &str, stage: Stage, status: Status) -> complaint::Model {
        complaint::Model {
            id: id.to_string(),
            title: "Broken projector".to_string(),
            description: "The projector in room 12 does not turn on".to_string(),
            category: "other".to_string(),
            created_by: "user1".to_string(),
            created_by_role: Role::Student,
            stage,
            status,
            response_due_at: None,
            auto_forwarded: false,
            revision: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let model = create_test_complaint("c1", Stage::Teacher, Status::Pending);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[model.clone()]])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let result = repo.find_by_id("c1").await.unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().id, "c1");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<complaint::Model>::new()])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(AppError::ComplaintNotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_transition_conflict_returns_none() {
        // Revision guard trips: zero rows updated, nothing appended.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let update = TransitionUpdate {
            stage: Stage::Principal,
            status: Status::Pending,
            response_due_at: None,
            auto_forwarded: None,
        };
        let entry = <history_entry::ActiveModel as Default>::default();

        let result = repo.apply_transition("c1", 1, update, entry).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_due_for_escalation_empty() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<complaint::Model>::new()])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let result = repo.find_due_for_escalation(Utc::now(), 100).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(5))
                }]])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let result = repo.count_by_status(Status::Pending).await.unwrap();
        assert_eq!(result, 5);
    }
}
