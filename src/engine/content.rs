// Content - authoring of posts, categories and comments
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{require_post, require_user};
use crate::db::models::{Category, Comment, Post};
use crate::error::{AppError, AppResult};
use crate::store::{NewPost, PostPatch, Store};
use crate::validation::{self, ValidationErrors};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub category_id: String,
    /// URL of an already stored image
    #[serde(default)]
    pub image: Option<String>,
}

/// Empty or absent fields keep their previous value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "category")]
    pub category_id: Option<String>,
    pub image: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn require_category(store: &dyn Store, id: &str) -> AppResult<Category> {
    store
        .find_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

fn title_taken(title: &str) -> AppError {
    AppError::Conflict(format!("Post with title: \"{}\" already exists.", title))
}

// --- posts ---

/// Only verified accounts may publish.
pub async fn create_post(
    store: &dyn Store,
    actor_id: &str,
    input: &PostInput,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    let actor = require_user(store, actor_id).await?;
    if !actor.is_verified {
        return Err(AppError::Forbidden(
            "Action denied, your account is not verified.".into(),
        ));
    }

    let mut errors = match validation::validate_post(Some(&input.title), Some(&input.content)) {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };
    if input.category_id.trim().is_empty() {
        errors.add("categoryId", "Category is required");
    }
    errors.into_result()?;

    let title = input.title.trim();
    let category = require_category(store, input.category_id.trim()).await?;

    if store.find_post_by_title(title).await?.is_some() {
        return Err(title_taken(title));
    }

    let post = store
        .create_post(
            NewPost {
                title: title.to_string(),
                content: input.content.trim().to_string(),
                image: non_empty(&input.image),
                author_id: actor.id.clone(),
                category_id: category.id,
            },
            now,
        )
        .await?;

    tracing::info!("User {} created post {}", actor.id, post.id);
    Ok(post)
}

pub async fn update_post(
    store: &dyn Store,
    actor_id: &str,
    post_id: &str,
    update: &PostUpdate,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    let post = require_post(store, post_id).await?;
    if post.author_id != actor_id {
        return Err(AppError::Forbidden(
            "Action denied: You are not the creator of this post.".into(),
        ));
    }

    let patch = PostPatch {
        title: non_empty(&update.title),
        content: non_empty(&update.content),
        image: non_empty(&update.image),
        category_id: non_empty(&update.category_id),
    };
    validation::validate_post(patch.title.as_deref(), patch.content.as_deref())?;

    if let Some(category_id) = &patch.category_id {
        require_category(store, category_id).await?;
    }
    if let Some(title) = &patch.title {
        if let Some(other) = store.find_post_by_title(title).await? {
            if other.id != post.id {
                return Err(title_taken(title));
            }
        }
    }

    store
        .update_post(post_id, patch, now)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}

/// Reactions, views and comments go with the post.
pub async fn delete_post(store: &dyn Store, actor_id: &str, post_id: &str) -> AppResult<Post> {
    let post = require_post(store, post_id).await?;
    if post.author_id != actor_id {
        return Err(AppError::Forbidden(
            "Action denied: You are not the creator of this post.".into(),
        ));
    }

    let deleted = store
        .delete_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    tracing::info!("User {} deleted post {}", actor_id, post_id);
    Ok(deleted)
}

// --- categories ---

pub async fn create_category(
    store: &dyn Store,
    actor_id: &str,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<Category> {
    validation::validate_category(Some(name), description)?;
    require_user(store, actor_id).await?;

    let name = validation::normalize_category_name(name);
    if store.find_category_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict("Category already exists.".into()));
    }

    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let category = store.create_category(&name, description, actor_id, now).await?;
    tracing::info!("User {} created category {}", actor_id, category.name);
    Ok(category)
}

pub async fn list_categories(store: &dyn Store) -> AppResult<Vec<Category>> {
    Ok(store.list_categories().await?)
}

async fn require_category_owner(store: &dyn Store, actor_id: &str, id: &str) -> AppResult<Category> {
    let category = require_category(store, id).await?;
    let actor = require_user(store, actor_id).await?;
    if category.author_id != actor.id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Only the category author or an admin can change this category.".into(),
        ));
    }
    Ok(category)
}

pub async fn update_category(
    store: &dyn Store,
    actor_id: &str,
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<Category> {
    validation::validate_category(name, description)?;
    let category = require_category_owner(store, actor_id, id).await?;

    let name = name.map(validation::normalize_category_name);
    if let Some(name) = &name {
        if let Some(other) = store.find_category_by_name(name).await? {
            if other.id != category.id {
                return Err(AppError::Conflict("Category already exists.".into()));
            }
        }
    }

    store
        .update_category(id, name.as_deref(), description.map(str::trim), now)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))
}

/// Posts of the category stay, uncategorised.
pub async fn delete_category(store: &dyn Store, actor_id: &str, id: &str) -> AppResult<Category> {
    require_category_owner(store, actor_id, id).await?;
    let deleted = store
        .delete_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    tracing::info!("User {} deleted category {}", actor_id, deleted.name);
    Ok(deleted)
}

// --- comments ---

pub async fn create_comment(
    store: &dyn Store,
    actor_id: &str,
    post_id: &str,
    content: &str,
    now: DateTime<Utc>,
) -> AppResult<Comment> {
    validation::validate_comment(content)?;
    require_user(store, actor_id).await?;
    require_post(store, post_id).await?;

    Ok(store
        .create_comment(content.trim(), actor_id, post_id, now)
        .await?)
}

async fn require_own_comment(store: &dyn Store, actor_id: &str, id: &str) -> AppResult<Comment> {
    let comment = store
        .find_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;
    if comment.author_id != actor_id {
        return Err(AppError::Forbidden(
            "You can only change your own comments.".into(),
        ));
    }
    Ok(comment)
}

pub async fn update_comment(
    store: &dyn Store,
    actor_id: &str,
    id: &str,
    content: &str,
    now: DateTime<Utc>,
) -> AppResult<Comment> {
    validation::validate_comment(content)?;
    require_own_comment(store, actor_id, id).await?;

    store
        .update_comment(id, content.trim(), now)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}

pub async fn delete_comment(store: &dyn Store, actor_id: &str, id: &str) -> AppResult<Comment> {
    require_own_comment(store, actor_id, id).await?;
    store
        .delete_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}
