//! Domain engines. Every operation takes the acting user and the clock
//! explicitly and talks to storage only through [`Store`].

pub mod accounts;
pub mod content;
pub mod engagement;
pub mod feed;
pub mod relationships;
pub mod tokens;

use crate::db::models::{Post, User};
use crate::error::{AppError, AppResult};
use crate::store::Store;

pub(crate) async fn require_user(store: &dyn Store, id: &str) -> AppResult<User> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub(crate) async fn require_post(store: &dyn Store, id: &str) -> AppResult<Post> {
    store
        .find_post(id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}
