//! Admin endpoints.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use grievance_common::{AppError, AppResult};
use grievance_core::services::{ComplaintOverview, WorkflowStats};
use grievance_db::entities::user::{self, Role};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

fn ensure_admin(user: &user::Model) -> AppResult<()> {
    if user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin only".to_string()))
    }
}

/// Aggregate workflow counters.
async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<WorkflowStats>> {
    ensure_admin(&user)?;
    let stats = state.complaint_service.stats().await?;
    Ok(ApiResponse::ok(stats))
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    50
}

/// A page of all complaints, newest first.
async fn list_complaints(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state
        .complaint_service
        .list_page(page.limit.min(200), page.offset)
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints raised by teachers.
async fn by_teachers(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state
        .complaint_service
        .list_by_creator_role(Role::Teacher)
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints raised by students.
async fn by_students(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state
        .complaint_service
        .list_by_creator_role(Role::Student)
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// All pending complaints.
async fn pending(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state.complaint_service.list_pending().await?;
    Ok(ApiResponse::ok(complaints))
}

/// How many complaints the recent-activity dashboard card shows.
const RECENT_ACTIVITY_LIMIT: usize = 3;

/// The complaints with the most recent ledger activity.
async fn recent_activity(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state
        .complaint_service
        .recent_activity(RECENT_ACTIVITY_LIMIT)
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// All completed complaints, approved or rejected.
async fn completed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    ensure_admin(&user)?;
    let complaints = state.complaint_service.list_completed().await?;
    Ok(ApiResponse::ok(complaints))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/complaints", get(list_complaints))
        .route("/complaints/by-teachers", get(by_teachers))
        .route("/complaints/by-students", get(by_students))
        .route("/complaints/pending", get(pending))
        .route("/complaints/completed", get(completed))
        .route("/complaints/recent-activity", get(recent_activity))
}
