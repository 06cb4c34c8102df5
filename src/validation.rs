// Field validation - pure functions run before any store mutation
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::db::models::Gender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every violated field of one input, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn check_length(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
        min: usize,
        max: Option<usize>,
    ) {
        let len = value.chars().count();
        if len < min {
            self.add(
                field,
                format!("{} must be at least {} characters long", label, min),
            );
        } else if let Some(max) = max {
            if len > max {
                self.add(field, format!("{} cannot exceed {} characters", label, max));
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;
pub const BIO_MAX: usize = 500;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const CONTENT_MIN: usize = 10;
pub const CATEGORY_NAME_MAX: usize = 50;
pub const CATEGORY_DESCRIPTION_MAX: usize = 200;
pub const COMMENT_MAX: usize = 500;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+@.+\..+").expect("email pattern compiles"));

/// Unanchored: the address only has to contain `something@something.something`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Category names are stored trimmed and lowercased.
pub fn normalize_category_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_username(&mut errors, username);
    check_email(&mut errors, email);
    check_password(&mut errors, password);
    errors.into_result()
}

pub fn validate_password(password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_password(&mut errors, password);
    errors.into_result()
}

pub fn validate_profile_update(
    username: Option<&str>,
    email: Option<&str>,
    bio: Option<&str>,
    gender: Option<&str>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(username) = username {
        check_username(&mut errors, username);
    }
    if let Some(email) = email {
        check_email(&mut errors, email);
    }
    if let Some(bio) = bio {
        errors.check_length("bio", "Bio", bio.trim(), 0, Some(BIO_MAX));
    }
    if let Some(gender) = gender {
        if gender.parse::<Gender>().is_err() {
            errors.add(
                "gender",
                "Gender must be one of: male, female, prefer not to say, non-binary",
            );
        }
    }
    errors.into_result()
}

pub fn validate_post(title: Option<&str>, content: Option<&str>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(title) = title {
        errors.check_length("title", "Title", title.trim(), TITLE_MIN, Some(TITLE_MAX));
    }
    if let Some(content) = content {
        errors.check_length("content", "Content", content.trim(), CONTENT_MIN, None);
    }
    errors.into_result()
}

pub fn validate_category(name: Option<&str>, description: Option<&str>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(name) = name {
        let name = name.trim();
        if name.is_empty() {
            errors.add("name", "Category name is required");
        } else if name.chars().count() > CATEGORY_NAME_MAX {
            errors.add(
                "name",
                format!("Category name cannot exceed {} characters", CATEGORY_NAME_MAX),
            );
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        {
            errors.add("name", "Category name must only contain letters and numbers");
        }
    }
    if let Some(description) = description {
        errors.check_length(
            "description",
            "Description",
            description.trim(),
            0,
            Some(CATEGORY_DESCRIPTION_MAX),
        );
    }
    errors.into_result()
}

pub fn validate_comment(content: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_length("content", "Comment content", content.trim(), 1, Some(COMMENT_MAX));
    errors.into_result()
}

fn check_username(errors: &mut ValidationErrors, username: &str) {
    errors.check_length(
        "username",
        "Username",
        username.trim(),
        USERNAME_MIN,
        Some(USERNAME_MAX),
    );
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email.trim()) {
        errors.add("email", "Please enter a valid email address");
    }
}

fn check_password(errors: &mut ValidationErrors, password: &str) {
    errors.check_length("password", "Password", password, PASSWORD_MIN, None);
}
