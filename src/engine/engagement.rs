// Engagement - reactions, claps and post views
use chrono::{DateTime, Utc};

use super::require_post;
use crate::db::models::{Post, ReactionKind};
use crate::error::{AppError, AppResult};
use crate::store::Store;

async fn react(
    store: &dyn Store,
    user_id: &str,
    post_id: &str,
    kind: ReactionKind,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    require_post(store, post_id).await?;
    store.set_reaction(post_id, user_id, kind, now).await?;
    tracing::debug!("User {} reacted {} to post {}", user_id, kind, post_id);
    require_post(store, post_id).await
}

/// Adds the user to `likes` and drops them from `dislikes`.
pub async fn like(store: &dyn Store, user_id: &str, post_id: &str, now: DateTime<Utc>) -> AppResult<Post> {
    react(store, user_id, post_id, ReactionKind::Like, now).await
}

pub async fn dislike(store: &dyn Store, user_id: &str, post_id: &str, now: DateTime<Utc>) -> AppResult<Post> {
    react(store, user_id, post_id, ReactionKind::Dislike, now).await
}

/// Exactly one more clap per call. No per-user limit.
pub async fn clap(store: &dyn Store, post_id: &str) -> AppResult<Post> {
    store
        .increment_claps(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    require_post(store, post_id).await
}

pub async fn record_view(store: &dyn Store, user_id: &str, post_id: &str, now: DateTime<Utc>) -> AppResult<Post> {
    require_post(store, post_id).await?;
    store.add_post_view(post_id, user_id, now).await?;
    require_post(store, post_id).await
}
