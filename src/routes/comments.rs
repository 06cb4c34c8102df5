use axum::extract::{Path, State};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use super::ApiResponse;
use crate::db::models::Comment;
use crate::engine::content;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    // POST takes the post id, PUT and DELETE the comment id
    Router::new().route(
        "/{id}",
        post(create_comment).put(update_comment).delete(delete_comment),
    )
}

#[derive(Deserialize)]
struct CommentRequest {
    #[serde(default)]
    content: String,
}

async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(post_id): Path<String>,
    JsonBody(input): JsonBody<CommentRequest>,
) -> AppResult<ApiResponse<Comment>> {
    let comment =
        content::create_comment(state.store.as_ref(), &actor.id, &post_id, &input.content, Utc::now()).await?;
    Ok(ApiResponse::created("Comment has been successfully created.", comment))
}

async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CommentRequest>,
) -> AppResult<ApiResponse<Comment>> {
    let comment =
        content::update_comment(state.store.as_ref(), &actor.id, &id, &input.content, Utc::now()).await?;
    Ok(ApiResponse::ok("Comment updated successfully.", comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Comment>> {
    let comment = content::delete_comment(state.store.as_ref(), &actor.id, &id).await?;
    Ok(ApiResponse::ok("Comment has been successfully deleted.", comment))
}
