use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "male")]
    Male,
    #[serde(rename = "female")]
    Female,
    #[serde(rename = "prefer not to say")]
    PreferNotToSay,
    #[serde(rename = "non-binary")]
    NonBinary,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::PreferNotToSay => "prefer not to say",
            Gender::NonBinary => "non-binary",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "prefer not to say" => Ok(Gender::PreferNotToSay),
            "non-binary" => Ok(Gender::NonBinary),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountLevel {
    Bronze,
    Silver,
    Gold,
}

impl AccountLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountLevel::Bronze => "bronze",
            AccountLevel::Silver => "silver",
            AccountLevel::Gold => "gold",
        }
    }
}

impl FromStr for AccountLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze" => Ok(AccountLevel::Bronze),
            "silver" => Ok(AccountLevel::Silver),
            "gold" => Ok(AccountLevel::Gold),
            other => Err(format!("unknown account level: {}", other)),
        }
    }
}

/// The two independent token lifecycles a user record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    PasswordReset,
    AccountVerification,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPurpose::PasswordReset => f.write_str("password-reset"),
            TokenPurpose::AccountVerification => f.write_str("account-verification"),
        }
    }
}

/// Stored half of a single-use token: the one-way hash and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSlot {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// A user record. The credential hash is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub account_level: AccountLevel,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Gender,
    pub profile_picture: Option<String>,
    pub cover_image: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub password_reset: Option<TokenSlot>,
    #[serde(skip)]
    pub account_verification: Option<TokenSlot>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn token_slot(&self, purpose: TokenPurpose) -> Option<&TokenSlot> {
        match purpose {
            TokenPurpose::PasswordReset => self.password_reset.as_ref(),
            TokenPurpose::AccountVerification => self.account_verification.as_ref(),
        }
    }

    pub fn token_slot_mut(&mut self, purpose: TokenPurpose) -> &mut Option<TokenSlot> {
        match purpose {
            TokenPurpose::PasswordReset => &mut self.password_reset,
            TokenPurpose::AccountVerification => &mut self.account_verification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub author_id: String,
    pub category_id: Option<String>,
    pub claps: i64,
    pub shares: i64,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub viewers: Vec<String>,
    pub comments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Visible once the schedule has elapsed, or immediately when unscheduled.
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_publish_at.map_or(true, |at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub author_id: String,
    pub posts: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub author_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
