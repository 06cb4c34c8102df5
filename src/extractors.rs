use std::collections::HashMap;

use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::db::models::User;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::ValidationErrors;

/// The user named by the request's bearer token.
/// Returns 401 if the token is missing, invalid, expired, or its user is gone.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("No token attached to the request.".into()))?;

        let claims = state.signer.verify(token, Utc::now()).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized("Invalid or expired token, please log in again.".into())
        })?;

        let user = state.store.find_user(&claims.sub).await?.ok_or_else(|| {
            AppError::Unauthorized("The user belonging to this token no longer exists.".into())
        })?;

        Ok(CurrentUser(user))
    }
}

/// `Json` whose rejections use the API envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(ValidationErrors::single("body", e.body_text())))?;
        Ok(JsonBody(value))
    }
}

/// Text fields plus at most one file, from either a multipart form or a
/// flat JSON object.
#[derive(Debug, Default)]
pub struct FormInput {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl FormInput {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

fn bad_form(message: impl Into<String>) -> AppError {
    AppError::Validation(ValidationErrors::single("file", message))
}

impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("multipart/form-data"));

        let mut input = FormInput::default();

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| bad_form(e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| bad_form(e.body_text()))?
            {
                let name = field.name().unwrap_or_default().to_string();
                match field.file_name().map(str::to_string) {
                    Some(file_name) => {
                        let bytes = field.bytes().await.map_err(|e| bad_form(e.body_text()))?;
                        input.file = Some(UploadedFile { file_name, bytes });
                    }
                    None => {
                        let text = field.text().await.map_err(|e| bad_form(e.body_text()))?;
                        input.fields.insert(name, text);
                    }
                }
            }
        } else {
            let JsonBody(map) =
                JsonBody::<HashMap<String, serde_json::Value>>::from_request(req, state).await?;
            for (key, value) in map {
                match value {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) => {
                        input.fields.insert(key, s);
                    }
                    other => {
                        input.fields.insert(key, other.to_string());
                    }
                }
            }
        }

        Ok(input)
    }
}
