use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use super::ApiResponse;
use crate::db::models::Category;
use crate::engine::content;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

#[derive(Deserialize)]
struct CategoryRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CategoryUpdateRequest {
    name: Option<String>,
    description: Option<String>,
}

async fn create_category(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(input): JsonBody<CategoryRequest>,
) -> AppResult<ApiResponse<Category>> {
    let category = content::create_category(
        state.store.as_ref(),
        &actor.id,
        &input.name,
        input.description.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::created("Category created successfully.", category))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Category>>> {
    let categories = content::list_categories(state.store.as_ref()).await?;
    Ok(ApiResponse::ok("Category successfully fetched", categories))
}

async fn update_category(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CategoryUpdateRequest>,
) -> AppResult<ApiResponse<Category>> {
    let category = content::update_category(
        state.store.as_ref(),
        &actor.id,
        &id,
        input.name.as_deref(),
        input.description.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::ok("Category updated successfully.", category))
}

async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Category>> {
    let category = content::delete_category(state.store.as_ref(), &actor.id, &id).await?;
    Ok(ApiResponse::ok("Category successfully deleted.", category))
}
