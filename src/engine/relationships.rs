// Relationship graph - follow, block and profile-view edges between users
use chrono::{DateTime, Utc};

use super::require_user;
use crate::error::{AppError, AppResult};
use crate::store::{EdgeKind, Store};

/// Re-following is a no-op. Both sides of the relation come from one edge,
/// so `following` and `followers` cannot disagree.
pub async fn follow(
    store: &dyn Store,
    actor_id: &str,
    target_id: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::SelfReference("You cannot follow yourself.".into()));
    }
    require_user(store, actor_id).await?;
    require_user(store, target_id).await?;

    if store.add_edge(EdgeKind::Follow, actor_id, target_id, now).await? {
        tracing::info!("User {} now follows {}", actor_id, target_id);
    }
    Ok(())
}

/// No-op when not following.
pub async fn unfollow(store: &dyn Store, actor_id: &str, target_id: &str) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::SelfReference("You cannot unfollow yourself.".into()));
    }
    require_user(store, target_id).await?;

    if store.remove_edge(EdgeKind::Follow, actor_id, target_id).await? {
        tracing::info!("User {} unfollowed {}", actor_id, target_id);
    }
    Ok(())
}

/// One-directional: existing follow edges are left alone.
pub async fn block(
    store: &dyn Store,
    actor_id: &str,
    target_id: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::SelfReference("You cannot block yourself.".into()));
    }
    require_user(store, actor_id).await?;
    require_user(store, target_id).await?;

    if !store.add_edge(EdgeKind::Block, actor_id, target_id, now).await? {
        return Err(AppError::Conflict("User is already blocked.".into()));
    }
    tracing::info!("User {} blocked {}", actor_id, target_id);
    Ok(())
}

pub async fn unblock(store: &dyn Store, actor_id: &str, target_id: &str) -> AppResult<()> {
    require_user(store, target_id).await?;

    if !store.remove_edge(EdgeKind::Block, actor_id, target_id).await? {
        return Err(AppError::Conflict("User is not blocked.".into()));
    }
    tracing::info!("User {} unblocked {}", actor_id, target_id);
    Ok(())
}

/// Idempotent. Looking at your own profile is not recorded.
pub async fn record_profile_view(
    store: &dyn Store,
    viewer_id: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    require_user(store, owner_id).await?;
    if viewer_id == owner_id {
        return Ok(());
    }
    store
        .add_edge(EdgeKind::ProfileView, viewer_id, owner_id, now)
        .await?;
    Ok(())
}
