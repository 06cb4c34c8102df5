// Store pattern - isolates all database side effects behind one contract
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{
    Category, Comment, Gender, Post, ReactionKind, Role, TokenPurpose, TokenSlot, User,
};
use crate::error::AppError;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Pool(e),
            StoreError::Sql(e) => AppError::Database(e),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A directed user-to-user relation, read as `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `from` follows `to`
    Follow,
    /// `from` has blocked `to`
    Block,
    /// `from` has viewed the profile of `to`
    ProfileView,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Option<Gender>,
    pub profile_picture: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<String>,
}

/// Filter, window and ordering for a post listing.
/// Results come back newest first, ties broken by id.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub excluded_authors: Vec<String>,
    pub author_id: Option<String>,
    pub category_id: Option<String>,
    /// Case-insensitive substring of the title
    pub search_term: Option<String>,
    /// Only posts whose schedule has elapsed at this instant
    pub published_at: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Matching posts across all pages
    pub total: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---

    async fn create_user(&self, user: NewUser, now: DateTime<Utc>) -> StoreResult<User>;

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// The only read that returns the credential hash.
    async fn find_credential(&self, username: &str) -> StoreResult<Option<(User, String)>>;

    async fn update_profile(
        &self,
        id: &str,
        patch: ProfilePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    async fn set_password_hash(&self, id: &str, hash: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    async fn set_verified(&self, id: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Overwrite (or clear, with `None`) one token slot.
    async fn save_token(
        &self,
        id: &str,
        purpose: TokenPurpose,
        slot: Option<&TokenSlot>,
    ) -> StoreResult<()>;

    async fn find_user_by_token(&self, purpose: TokenPurpose, hash: &str) -> StoreResult<Option<User>>;

    /// Clear the slot only if it still holds `hash`. Returns false when
    /// another caller consumed it first.
    async fn clear_token(&self, id: &str, purpose: TokenPurpose, hash: &str) -> StoreResult<bool>;

    // --- relationship edges ---

    /// Set-add. Returns false when the edge already existed.
    async fn add_edge(&self, kind: EdgeKind, from: &str, to: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Returns false when there was nothing to remove.
    async fn remove_edge(&self, kind: EdgeKind, from: &str, to: &str) -> StoreResult<bool>;

    async fn has_edge(&self, kind: EdgeKind, from: &str, to: &str) -> StoreResult<bool>;

    /// Every `to` with an edge from `from`.
    async fn edges_from(&self, kind: EdgeKind, from: &str) -> StoreResult<Vec<String>>;

    /// Every `from` with an edge to `to`.
    async fn edges_to(&self, kind: EdgeKind, to: &str) -> StoreResult<Vec<String>>;

    // --- categories ---

    async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
        author_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Category>;

    async fn find_category(&self, id: &str) -> StoreResult<Option<Category>>;

    async fn find_category_by_name(&self, name: &str) -> StoreResult<Option<Category>>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    async fn update_category(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Category>>;

    async fn delete_category(&self, id: &str) -> StoreResult<Option<Category>>;

    // --- posts ---

    async fn create_post(&self, post: NewPost, now: DateTime<Utc>) -> StoreResult<Post>;

    async fn find_post(&self, id: &str) -> StoreResult<Option<Post>>;

    async fn find_post_by_title(&self, title: &str) -> StoreResult<Option<Post>>;

    async fn update_post(&self, id: &str, patch: PostPatch, now: DateTime<Utc>) -> StoreResult<Option<Post>>;

    async fn delete_post(&self, id: &str) -> StoreResult<Option<Post>>;

    async fn set_schedule(
        &self,
        id: &str,
        publish_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>>;

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<PostPage>;

    async fn post_ids_by_author(&self, author_id: &str) -> StoreResult<Vec<String>>;

    // --- engagement ---

    /// Record `kind` as the user's only reaction to the post, replacing
    /// any opposite reaction.
    async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Returns the new count, or None when the post is missing.
    async fn increment_claps(&self, post_id: &str) -> StoreResult<Option<i64>>;

    async fn add_post_view(&self, post_id: &str, user_id: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    // --- comments ---

    async fn create_comment(
        &self,
        content: &str,
        author_id: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Comment>;

    async fn find_comment(&self, id: &str) -> StoreResult<Option<Comment>>;

    async fn update_comment(&self, id: &str, content: &str, now: DateTime<Utc>) -> StoreResult<Option<Comment>>;

    async fn delete_comment(&self, id: &str) -> StoreResult<Option<Comment>>;

    /// Oldest first.
    async fn list_comments(&self, post_id: &str) -> StoreResult<Vec<Comment>>;
}

/// Type alias for Arc-wrapped store (for AppState)
pub type DynStore = Arc<dyn Store>;
