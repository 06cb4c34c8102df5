use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::ApiResponse;
use crate::db::models::Post;
use crate::engine::content::{self, PostInput, PostUpdate};
use crate::engine::feed::{self, FeedParams, PostView};
use crate::engine::engagement;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, FormInput, JsonBody};
use crate::state::AppState;
use crate::validation::ValidationErrors;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feed).post(create_post))
        .route("/public-posts", get(list_public_posts))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/post-views-count", put(record_view))
        .route("/likes/{id}", put(like))
        .route("/dislikes/{id}", put(dislike))
        .route("/claps/{id}", put(clap))
        .route("/schedule/{id}", put(schedule))
}

/// Numbers are parsed leniently: anything unparsable falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedQuery {
    category: Option<String>,
    search_term: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

impl From<FeedQuery> for FeedParams {
    fn from(q: FeedQuery) -> Self {
        FeedParams {
            category_id: q.category,
            search_term: q.search_term,
            page: q.page.and_then(|p| p.trim().parse().ok()),
            limit: q.limit.and_then(|l| l.trim().parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    scheduled_publish: Option<DateTime<Utc>>,
}

/// Stores the attached image, if any, and returns its URL.
async fn store_image(state: &AppState, form: &mut FormInput) -> AppResult<Option<String>> {
    match form.file.take() {
        Some(file) => Ok(Some(state.uploads.store(&file.file_name, file.bytes).await?)),
        None => Ok(None),
    }
}

async fn list_feed(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<PostView>>> {
    let params = FeedParams::from(query);
    let page = feed::list_feed(
        state.store.as_ref(),
        &viewer.id,
        &params,
        &state.config.feed,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::ok("Posts successfully fetched.", page.posts).with_pagination(page.pagination))
}

async fn list_public_posts(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<PostView>>> {
    let posts = feed::list_public_posts(state.store.as_ref(), Utc::now()).await?;
    Ok(ApiResponse::ok("Posts successfully fetched.", posts))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostView>> {
    let post = feed::get_post(state.store.as_ref(), &id).await?;
    Ok(ApiResponse::ok("Post successfully fetched.", post))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    mut form: FormInput,
) -> AppResult<ApiResponse<Post>> {
    let mut input = PostInput {
        title: form.text("title").unwrap_or_default(),
        content: form.text("content").unwrap_or_default(),
        category_id: form
            .text("categoryId")
            .or_else(|| form.text("category"))
            .unwrap_or_default(),
        image: form.text("image"),
    };
    if let Some(url) = store_image(&state, &mut form).await? {
        input.image = Some(url);
    }

    let post = content::create_post(state.store.as_ref(), &actor.id, &input, Utc::now()).await?;
    Ok(ApiResponse::created("Post created successfully.", post))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    mut form: FormInput,
) -> AppResult<ApiResponse<Post>> {
    let mut update = PostUpdate {
        title: form.text("title"),
        content: form.text("content"),
        category_id: form.text("categoryId").or_else(|| form.text("category")),
        image: form.text("image"),
    };
    if let Some(url) = store_image(&state, &mut form).await? {
        update.image = Some(url);
    }

    let post = content::update_post(state.store.as_ref(), &actor.id, &id, &update, Utc::now()).await?;
    Ok(ApiResponse::ok("Post updated successfully.", post))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    let post = content::delete_post(state.store.as_ref(), &actor.id, &id).await?;
    Ok(ApiResponse::ok("Post successfully deleted.", post))
}

async fn like(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    let post = engagement::like(state.store.as_ref(), &actor.id, &id, Utc::now()).await?;
    Ok(ApiResponse::ok("Post liked successfully.", post))
}

async fn dislike(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    let post = engagement::dislike(state.store.as_ref(), &actor.id, &id, Utc::now()).await?;
    Ok(ApiResponse::ok("Post disliked successfully.", post))
}

async fn clap(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    let post = engagement::clap(state.store.as_ref(), &id).await?;
    Ok(ApiResponse::ok("Post clapped successfully.", post))
}

async fn record_view(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Post>> {
    let post = engagement::record_view(state.store.as_ref(), &actor.id, &id, Utc::now()).await?;
    Ok(ApiResponse::ok("Post view recorded.", post))
}

async fn schedule(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ScheduleRequest>,
) -> AppResult<ApiResponse<Post>> {
    let publish_at = input.scheduled_publish.ok_or_else(|| {
        ValidationErrors::single("scheduledPublish", "A scheduled publish date is required.")
    })?;

    let post = feed::schedule_post(state.store.as_ref(), &actor.id, &id, publish_at, Utc::now()).await?;
    Ok(ApiResponse::ok("Post scheduled successfully.", post))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_query_parses_leniently() {
        let params = FeedParams::from(FeedQuery {
            page: Some("abc".into()),
            limit: Some(" 10 ".into()),
            search_term: Some("rust".into()),
            ..Default::default()
        });
        assert_eq!(params.page, None);
        assert_eq!(params.limit, Some(10));
        assert_eq!(params.search_term.as_deref(), Some("rust"));
    }
}
