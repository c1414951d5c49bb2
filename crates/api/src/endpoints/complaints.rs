//! Complaint lifecycle endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use grievance_common::{AppError, AppResult};
use grievance_core::services::{
    ActedByMeView, ComplaintOverview, ComplaintTrack, CreateComplaintInput, LaterRejectedView,
};
use grievance_db::entities::complaint;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create a new complaint.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateComplaintInput>,
) -> AppResult<ApiResponse<complaint::Model>> {
    let created = state.complaint_service.create(&user, input).await?;
    Ok(ApiResponse::ok(created))
}

/// Inbox query parameters.
#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub category: Option<String>,
}

/// Pending complaints awaiting the caller's role.
async fn inbox(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    let complaints = state
        .complaint_service
        .inbox(&user, query.category.as_deref())
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints created by the caller.
async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ComplaintOverview>>> {
    let complaints = state.complaint_service.mine(&user).await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints the caller approved up the chain.
async fn forwarded_by_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ActedByMeView>>> {
    let complaints = state.complaint_service.forwarded_by_me(&user).await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints the caller rejected.
async fn rejected_by_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ActedByMeView>>> {
    let complaints = state.complaint_service.rejected_by_me(&user).await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints whose ledger credits the caller with an auto-escalation.
async fn auto_forwarded_by_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ActedByMeView>>> {
    let complaints = state.complaint_service.auto_forwarded_by_me(&user).await?;
    Ok(ApiResponse::ok(complaints))
}

/// Complaints the caller approved that a later stage rejected.
async fn my_approvals_later_rejected(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<LaterRejectedView>>> {
    let complaints = state
        .complaint_service
        .approvals_later_rejected(&user)
        .await?;
    Ok(ApiResponse::ok(complaints))
}

/// A single complaint with its full ledger.
async fn get_detail(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ComplaintTrack>> {
    let track = state.complaint_service.get_detail(&id, &user).await?;
    Ok(ApiResponse::ok(track))
}

/// Track a complaint through the approval chain.
async fn track(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ComplaintTrack>> {
    let track = state.complaint_service.track(&id, &user).await?;
    Ok(ApiResponse::ok(track))
}

/// Approve request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub reason: Option<String>,
}

/// Approve at the current stage.
///
/// A revision conflict means a concurrent transition won; the handler
/// re-reads and retries once before surfacing the conflict.
async fn approve(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> AppResult<ApiResponse<complaint::Model>> {
    let result = state
        .complaint_service
        .approve(&id, &user, req.reason.clone())
        .await;

    let updated = match result {
        Err(AppError::Conflict(_)) => state.complaint_service.approve(&id, &user, req.reason).await,
        other => other,
    }?;

    Ok(ApiResponse::ok(updated))
}

/// Reject request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub reason: String,
}

/// Reject at the current stage. Terminal.
async fn reject(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> AppResult<ApiResponse<complaint::Model>> {
    let result = state.complaint_service.reject(&id, &user, &req.reason).await;

    let updated = match result {
        Err(AppError::Conflict(_)) => state.complaint_service.reject(&id, &user, &req.reason).await,
        other => other,
    }?;

    Ok(ApiResponse::ok(updated))
}

/// Comment request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub comment: String,
}

/// Append a comment to the complaint's ledger.
async fn comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<ApiResponse<complaint::Model>> {
    let updated = state
        .complaint_service
        .comment(&id, &user, &req.comment)
        .await?;
    Ok(ApiResponse::ok(updated))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/inbox", get(inbox))
        .route("/mine", get(mine))
        .route("/forwarded-by-me", get(forwarded_by_me))
        .route("/rejected-by-me", get(rejected_by_me))
        .route("/auto-forwarded-by-me", get(auto_forwarded_by_me))
        .route("/my-approvals-later-rejected", get(my_approvals_later_rejected))
        .route("/{id}", get(get_detail))
        .route("/{id}/track", get(track))
        .route("/{id}/approve", post(approve))
        .route("/{id}/reject", post(reject))
        .route("/{id}/comment", post(comment))
}
