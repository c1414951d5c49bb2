//! History ledger repository.
//!
//! Read-side access to the append-only ledger. Appends happen through
//! [`crate::repositories::ComplaintRepository`] so they stay atomic with the
//! complaint row update.

use std::sync::Arc;

use grievance_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::{HistoryEntry, history_entry, history_entry::HistoryAction};

/// History repository for database operations.
#[derive(Clone)]
pub struct HistoryRepository {
    db: Arc<DatabaseConnection>,
}

impl HistoryRepository {
    /// Create a new history repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get a complaint's ledger in insertion order.
    pub async fn find_by_complaint(
        &self,
        complaint_id: &str,
    ) -> AppResult<Vec<history_entry::Model>> {
        HistoryEntry::find()
            .filter(history_entry::Column::ComplaintId.eq(complaint_id))
            .order_by_asc(history_entry::Column::Seq)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the ledgers of several complaints in one query, in insertion
    /// order per complaint.
    pub async fn find_by_complaints(
        &self,
        complaint_ids: &[String],
    ) -> AppResult<Vec<history_entry::Model>> {
        if complaint_ids.is_empty() {
            return Ok(Vec::new());
        }

        HistoryEntry::find()
            .filter(history_entry::Column::ComplaintId.is_in(complaint_ids.iter().cloned()))
            .order_by_asc(history_entry::Column::ComplaintId)
            .order_by_asc(history_entry::Column::Seq)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find ledger entries recorded by an actor for a given action.
    pub async fn find_by_actor_and_action(
        &self,
        actor_id: &str,
        action: HistoryAction,
    ) -> AppResult<Vec<history_entry::Model>> {
        HistoryEntry::find()
            .filter(history_entry::Column::ActorId.eq(actor_id))
            .filter(history_entry::Column::Action.eq(action))
            .order_by_asc(history_entry::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The most recently written ledger entries across all complaints,
    /// newest first.
    pub async fn find_recent(&self, limit: u64) -> AppResult<Vec<history_entry::Model>> {
        HistoryEntry::find()
            .order_by_desc(history_entry::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all ledger entries for a given action (used by admin stats).
    pub async fn find_by_action(
        &self,
        action: HistoryAction,
    ) -> AppResult<Vec<history_entry::Model>> {
        HistoryEntry::find()
            .filter(history_entry::Column::Action.eq(action))
            .order_by_asc(history_entry::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_entry(id: &str, complaint_id: &str, seq: i32) -> history_entry::Model {
        history_entry::Model {
            id: id.to_string(),
            complaint_id: complaint_id.to_string(),
            actor_id: Some("user1".to_string()),
            actor_role: "student".to_string(),
            actor_email: "student@example.edu".to_string(),
            action: HistoryAction::Created,
            comment: Some("initial description".to_string()),
            reason: None,
            seq,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_complaint() {
        let entries = vec![
            create_test_entry("h1", "c1", 0),
            create_test_entry("h2", "c1", 1),
        ];
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([entries])
                .into_connection(),
        );

        let repo = HistoryRepository::new(db);
        let result = repo.find_by_complaint("c1").await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].seq, 0);
    }

    #[tokio::test]
    async fn test_find_by_complaints_empty_ids_skips_query() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
        );

        let repo = HistoryRepository::new(db);
        let result = repo.find_by_complaints(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
