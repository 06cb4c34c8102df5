use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use super::ApiResponse;
use crate::db::models::User;
use crate::engine::accounts::{
    self, ImageSlot, Profile, ProfileUpdate, PublicProfile, Registration,
};
use crate::engine::relationships;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, FormInput, JsonBody};
use crate::state::AppState;
use crate::validation::ValidationErrors;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/public-profile/{id}", get(public_profile))
        .route("/profile-viewer/{id}", get(view_profile))
        .route("/update-profile", put(update_profile))
        .route("/profile-picture", put(upload_profile_picture))
        .route("/cover-image", put(upload_cover_image))
        .route("/following/{id}", put(follow))
        .route("/unfollowing/{id}", put(unfollow))
        .route("/block/{id}", put(block))
        .route("/unblock/{id}", put(unblock))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", post(reset_password))
        .route("/account-verification-email", put(send_verification_email))
        .route("/verify-account/{token}", put(verify_account))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct ForgotPasswordRequest {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ResetPasswordRequest {
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<Registration>,
) -> AppResult<ApiResponse<User>> {
    let user = accounts::register(state.store.as_ref(), state.hasher.as_ref(), &input, Utc::now()).await?;
    Ok(ApiResponse::created("User registered successfully.", user))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginRequest>,
) -> AppResult<ApiResponse<User>> {
    let (user, token) = accounts::login(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &state.signer,
        &input.username,
        &input.password,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::ok("User logged in successfully.", user).with_token(token))
}

async fn profile(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> AppResult<ApiResponse<Profile>> {
    let profile = accounts::profile(state.store.as_ref(), &actor.id).await?;
    Ok(ApiResponse::ok("User profile retrieved successfully.", profile))
}

async fn public_profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PublicProfile>> {
    let profile = accounts::public_profile(state.store.as_ref(), &viewer.id, &id, Utc::now()).await?;
    Ok(ApiResponse::ok("Public profile retrieved successfully.", profile))
}

async fn view_profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    relationships::record_profile_view(state.store.as_ref(), &viewer.id, &id, Utc::now()).await?;
    Ok(ApiResponse::message("Profile viewed successfully."))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    JsonBody(input): JsonBody<ProfileUpdate>,
) -> AppResult<ApiResponse<User>> {
    let user = accounts::update_profile(state.store.as_ref(), &actor.id, &input, Utc::now()).await?;
    Ok(ApiResponse::ok("User profile updated successfully.", user))
}

async fn upload_image(state: &AppState, actor: &User, slot: ImageSlot, form: FormInput) -> AppResult<User> {
    let file = form
        .file
        .ok_or_else(|| AppError::Validation(ValidationErrors::single("file", "An image file is required")))?;

    accounts::upload_image(
        state.store.as_ref(),
        state.uploads.as_ref(),
        &actor.id,
        slot,
        &file.file_name,
        file.bytes,
        Utc::now(),
    )
    .await
}

async fn upload_profile_picture(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    form: FormInput,
) -> AppResult<ApiResponse<User>> {
    let user = upload_image(&state, &actor, ImageSlot::ProfilePicture, form).await?;
    Ok(ApiResponse::ok("Profile picture uploaded successfully.", user))
}

async fn upload_cover_image(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    form: FormInput,
) -> AppResult<ApiResponse<User>> {
    let user = upload_image(&state, &actor, ImageSlot::CoverImage, form).await?;
    Ok(ApiResponse::ok("Cover image uploaded successfully.", user))
}

async fn follow(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    relationships::follow(state.store.as_ref(), &actor.id, &id, Utc::now()).await?;
    Ok(ApiResponse::message("You have successfully followed the user."))
}

async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    relationships::unfollow(state.store.as_ref(), &actor.id, &id).await?;
    Ok(ApiResponse::message("You have successfully unfollowed the user."))
}

async fn block(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    relationships::block(state.store.as_ref(), &actor.id, &id, Utc::now()).await?;
    Ok(ApiResponse::message("User blocked successfully."))
}

async fn unblock(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    relationships::unblock(state.store.as_ref(), &actor.id, &id).await?;
    Ok(ApiResponse::message("User unblocked successfully."))
}

async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    accounts::forgot_password(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.links(),
        &input.email,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::message("Password reset email sent successfully."))
}

async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(input): JsonBody<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    accounts::reset_password(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &token,
        &input.password,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::message("Password reset successfully."))
}

async fn send_verification_email(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> AppResult<ApiResponse<()>> {
    accounts::send_verification_email(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.links(),
        &actor.id,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::message(format!(
        "Account verification email sent to {}.",
        actor.email.as_deref().unwrap_or_default()
    )))
}

async fn verify_account(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(token): Path<String>,
) -> AppResult<ApiResponse<User>> {
    let user = accounts::verify_account(state.store.as_ref(), &token, Utc::now()).await?;
    Ok(ApiResponse::ok("Account successfully verified.", user))
}
