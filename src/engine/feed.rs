// Visibility & feed - which posts a viewer may see, and how they are composed
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::require_post;
use crate::config::FeedConfig;
use crate::db::models::{Category, Comment, Post, Role, User};
use crate::error::{AppError, AppResult};
use crate::store::{EdgeKind, PostQuery, Store};
use crate::validation::ValidationErrors;

pub const PUBLIC_POSTS_LIMIT: u64 = 4;

#[derive(Debug, Clone, Default)]
pub struct FeedParams {
    pub category_id: Option<String>,
    pub search_term: Option<String>,
    /// 1-indexed
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PageRef>,
}

impl Pagination {
    /// Neighbouring pages of the window `[(page-1)*limit, page*limit)` over
    /// `total` matches.
    pub fn for_window(page: u64, limit: u64, total: u64) -> Self {
        let start = page.saturating_sub(1).saturating_mul(limit);
        let end = page.saturating_mul(limit);
        Self {
            next: (end < total).then_some(PageRef { page: page.saturating_add(1), limit }),
            previous: (start > 0).then_some(PageRef { page: page.saturating_sub(1), limit }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub profile_picture: Option<String>,
}

impl From<User> for AuthorSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile_picture: user.profile_picture,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<Category> for CategorySummary {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: Option<String>,
}

/// A post with its references resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<AuthorSummary>,
    pub category: Option<CategorySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_thread: Option<Vec<CommentView>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
    pub total: u64,
}

async fn compose(store: &dyn Store, post: Post, with_comments: bool) -> AppResult<PostView> {
    let author = store.find_user(&post.author_id).await?.map(AuthorSummary::from);

    let category = match &post.category_id {
        Some(id) => store.find_category(id).await?.map(CategorySummary::from),
        None => None,
    };

    let comment_thread = if with_comments {
        let mut thread = Vec::new();
        for comment in store.list_comments(&post.id).await? {
            let author_username = store
                .find_user(&comment.author_id)
                .await?
                .map(|u| u.username);
            thread.push(CommentView {
                comment,
                author_username,
            });
        }
        Some(thread)
    } else {
        None
    };

    Ok(PostView {
        post,
        author,
        category,
        comment_thread,
    })
}

/// The feed a viewer is entitled to: no posts by users who blocked them,
/// nothing scheduled for later than `now`.
pub async fn list_feed(
    store: &dyn Store,
    viewer_id: &str,
    params: &FeedParams,
    limits: &FeedConfig,
    now: DateTime<Utc>,
) -> AppResult<FeedPage> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(u64::from(limits.default_limit))
        .min(u64::from(limits.max_limit));

    let blocking_user_ids = store.edges_to(EdgeKind::Block, viewer_id).await?;

    let query = PostQuery {
        excluded_authors: blocking_user_ids,
        category_id: params.category_id.clone().filter(|c| !c.is_empty()),
        search_term: params
            .search_term
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        published_at: Some(now),
        // saturates; the store returns no rows past the last addressable offset
        offset: (page - 1).saturating_mul(limit),
        limit,
        ..Default::default()
    };

    let result = store.query_posts(&query).await?;

    let mut posts = Vec::with_capacity(result.posts.len());
    for post in result.posts {
        posts.push(compose(store, post, false).await?);
    }

    Ok(FeedPage {
        posts,
        pagination: Pagination::for_window(page, limit, result.total),
        total: result.total,
    })
}

pub async fn get_post(store: &dyn Store, post_id: &str) -> AppResult<PostView> {
    let post = require_post(store, post_id).await?;
    compose(store, post, true).await
}

/// Latest posts for anonymous visitors.
pub async fn list_public_posts(store: &dyn Store, now: DateTime<Utc>) -> AppResult<Vec<PostView>> {
    let result = store
        .query_posts(&PostQuery {
            published_at: Some(now),
            limit: PUBLIC_POSTS_LIMIT,
            ..Default::default()
        })
        .await?;

    let mut posts = Vec::with_capacity(result.posts.len());
    for post in result.posts {
        posts.push(compose(store, post, false).await?);
    }
    Ok(posts)
}

/// Posts by `author_id` as `viewer_id` may see them. Authors see their own
/// scheduled posts; a viewer the author has blocked sees none.
pub async fn visible_posts_by(
    store: &dyn Store,
    viewer_id: &str,
    author_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Vec<Post>> {
    if viewer_id != author_id && store.has_edge(EdgeKind::Block, author_id, viewer_id).await? {
        return Ok(Vec::new());
    }

    let result = store
        .query_posts(&PostQuery {
            author_id: Some(author_id.to_string()),
            published_at: (viewer_id != author_id).then_some(now),
            limit: i64::MAX as u64,
            ..Default::default()
        })
        .await?;
    Ok(result.posts)
}

pub async fn schedule_post(
    store: &dyn Store,
    actor_id: &str,
    post_id: &str,
    publish_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    let post = require_post(store, post_id).await?;

    if post.author_id != actor_id {
        return Err(AppError::Forbidden(
            "You are only authorized to schedule your own posts.".into(),
        ));
    }
    if publish_at <= now {
        return Err(ValidationErrors::single(
            "scheduledPublish",
            "The scheduled publish date must be in the future.",
        )
        .into());
    }

    let post = store
        .set_schedule(post_id, Some(publish_at), now)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    tracing::info!("Post {} scheduled for {}", post_id, publish_at);
    Ok(post)
}
