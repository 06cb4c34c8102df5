// Accounts - registration, login, profiles and the two token-backed flows
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{feed, require_user, tokens};
use crate::auth::{CredentialHasher, TokenSigner};
use crate::db::models::{AccountLevel, Gender, Post, Role, TokenPurpose, User};
use crate::error::{AppError, AppResult};
use crate::mail::{self, Mailer};
use crate::store::{EdgeKind, NewUser, ProfilePatch, Store};
use crate::uploads::UploadStore;
use crate::validation::{self, ValidationErrors};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Option<String>,
}

/// Where mailed links point and how long their tokens live.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub public_url: String,
    pub token_ttl: Duration,
}

/// The acting user's own view of their account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub blocked_users: Vec<String>,
    pub profile_viewers: Vec<String>,
    pub posts: Vec<String>,
}

/// What other users may see of an account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub is_verified: bool,
    pub account_level: AccountLevel,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub gender: Gender,
    pub profile_picture: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub followers_count: usize,
    pub following_count: usize,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    ProfilePicture,
    CoverImage,
}

pub async fn register(
    store: &dyn Store,
    hasher: &dyn CredentialHasher,
    input: &Registration,
    now: DateTime<Utc>,
) -> AppResult<User> {
    validation::validate_registration(&input.username, &input.email, &input.password)?;

    let username = input.username.trim().to_string();
    let email = validation::normalize_email(&input.email);

    if store.find_user_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict(
            "Username is already taken. Please choose a different one.".into(),
        ));
    }
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered.".into()));
    }

    let user = store
        .create_user(
            NewUser {
                username,
                email: Some(email),
                password_hash: hasher.hash(&input.password)?,
                role: Role::User,
            },
            now,
        )
        .await?;

    tracing::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Unknown user and wrong password fail identically.
pub async fn login(
    store: &dyn Store,
    hasher: &dyn CredentialHasher,
    signer: &TokenSigner,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> AppResult<(User, String)> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        let mut errors = ValidationErrors::new();
        if username.is_empty() {
            errors.add("username", "Username is required");
        }
        if password.is_empty() {
            errors.add("password", "Password is required");
        }
        return Err(errors.into());
    }

    let invalid = || AppError::Unauthorized("Invalid login credentials.".into());

    let (mut user, hash) = store.find_credential(username).await?.ok_or_else(invalid)?;
    if !hasher.verify(password, &hash) {
        tracing::warn!("Failed login for {}", username);
        return Err(invalid());
    }

    store.record_login(&user.id, now).await?;
    user.last_login = Some(now);

    let token = signer.sign(&user.id, now)?;
    tracing::info!("User {} logged in", user.username);
    Ok((user, token))
}

pub async fn profile(store: &dyn Store, actor_id: &str) -> AppResult<Profile> {
    let user = require_user(store, actor_id).await?;

    Ok(Profile {
        followers: store.edges_to(EdgeKind::Follow, actor_id).await?,
        following: store.edges_from(EdgeKind::Follow, actor_id).await?,
        blocked_users: store.edges_from(EdgeKind::Block, actor_id).await?,
        profile_viewers: store.edges_to(EdgeKind::ProfileView, actor_id).await?,
        posts: store.post_ids_by_author(actor_id).await?,
        user,
    })
}

pub async fn public_profile(
    store: &dyn Store,
    viewer_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<PublicProfile> {
    let user = require_user(store, user_id).await?;
    let followers_count = store.edges_to(EdgeKind::Follow, user_id).await?.len();
    let following_count = store.edges_from(EdgeKind::Follow, user_id).await?.len();
    let posts = feed::visible_posts_by(store, viewer_id, user_id, now).await?;

    Ok(PublicProfile {
        id: user.id,
        username: user.username,
        role: user.role,
        is_verified: user.is_verified,
        account_level: user.account_level,
        bio: user.bio,
        location: user.location,
        gender: user.gender,
        profile_picture: user.profile_picture,
        cover_image: user.cover_image,
        created_at: user.created_at,
        followers_count,
        following_count,
        posts,
    })
}

pub async fn update_profile(
    store: &dyn Store,
    actor_id: &str,
    input: &ProfileUpdate,
    now: DateTime<Utc>,
) -> AppResult<User> {
    validation::validate_profile_update(
        input.username.as_deref(),
        input.email.as_deref(),
        input.bio.as_deref(),
        input.gender.as_deref(),
    )?;
    require_user(store, actor_id).await?;

    let username = input.username.as_deref().map(|u| u.trim().to_string());
    let email = input.email.as_deref().map(validation::normalize_email);

    if let Some(username) = &username {
        if let Some(other) = store.find_user_by_username(username).await? {
            if other.id != actor_id {
                return Err(AppError::Conflict(
                    "Username is already taken. Please choose a different one.".into(),
                ));
            }
        }
    }
    if let Some(email) = &email {
        if let Some(other) = store.find_user_by_email(email).await? {
            if other.id != actor_id {
                return Err(AppError::Conflict("Email is already registered.".into()));
            }
        }
    }

    let gender = match input.gender.as_deref() {
        Some(g) => Some(g.parse::<Gender>().map_err(|e| ValidationErrors::single("gender", e))?),
        None => None,
    };

    let patch = ProfilePatch {
        username,
        email,
        bio: input.bio.as_deref().map(|b| b.trim().to_string()),
        location: input.location.as_deref().map(|l| l.trim().to_string()),
        gender,
        ..Default::default()
    };

    store
        .update_profile(actor_id, patch, now)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn upload_image(
    store: &dyn Store,
    uploads: &dyn UploadStore,
    actor_id: &str,
    slot: ImageSlot,
    file_name: &str,
    bytes: Bytes,
    now: DateTime<Utc>,
) -> AppResult<User> {
    require_user(store, actor_id).await?;
    let url = uploads.store(file_name, bytes).await?;

    let patch = match slot {
        ImageSlot::ProfilePicture => ProfilePatch {
            profile_picture: Some(url),
            ..Default::default()
        },
        ImageSlot::CoverImage => ProfilePatch {
            cover_image: Some(url),
            ..Default::default()
        },
    };

    store
        .update_profile(actor_id, patch, now)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// Sending is the whole point here, so a mail failure fails the call and
/// the undelivered token is withdrawn.
pub async fn forgot_password(
    store: &dyn Store,
    mailer: &dyn Mailer,
    links: &LinkSettings,
    email: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let email = validation::normalize_email(email);
    if !validation::is_valid_email(&email) {
        return Err(ValidationErrors::single("email", "Please enter a valid email address").into());
    }

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that email address.".into()))?;

    let token = tokens::issue(store, &user, TokenPurpose::PasswordReset, now, links.token_ttl).await?;
    let message = mail::password_reset_email(
        &email,
        &user.username,
        &links.public_url,
        &token,
        links.token_ttl.num_minutes(),
    )?;

    deliver(store, mailer, &user, TokenPurpose::PasswordReset, &message).await
}

pub async fn reset_password(
    store: &dyn Store,
    hasher: &dyn CredentialHasher,
    token: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> AppResult<User> {
    validation::validate_password(new_password)?;

    let user = tokens::consume(store, TokenPurpose::PasswordReset, token, now).await?;
    let hash = hasher.hash(new_password)?;
    if !store.set_password_hash(&user.id, &hash, now).await? {
        return Err(AppError::not_found("User"));
    }

    tracing::info!("Password reset for user {}", user.id);
    Ok(user)
}

pub async fn send_verification_email(
    store: &dyn Store,
    mailer: &dyn Mailer,
    links: &LinkSettings,
    actor_id: &str,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let user = require_user(store, actor_id).await?;
    if user.is_verified {
        return Err(AppError::Conflict("Account is already verified.".into()));
    }
    let Some(email) = user.email.clone() else {
        return Err(ValidationErrors::single("email", "Add an email address before verifying your account").into());
    };

    let token = tokens::issue(store, &user, TokenPurpose::AccountVerification, now, links.token_ttl).await?;
    let message = mail::account_verification_email(
        &email,
        &user.username,
        &links.public_url,
        &token,
        links.token_ttl.num_minutes(),
    )?;

    deliver(store, mailer, &user, TokenPurpose::AccountVerification, &message).await
}

pub async fn verify_account(store: &dyn Store, token: &str, now: DateTime<Utc>) -> AppResult<User> {
    let user = tokens::consume(store, TokenPurpose::AccountVerification, token, now).await?;
    store.set_verified(&user.id, now).await?;
    tracing::info!("Verified account {}", user.id);
    require_user(store, &user.id).await
}

async fn deliver(
    store: &dyn Store,
    mailer: &dyn Mailer,
    user: &User,
    purpose: TokenPurpose,
    message: &mail::Email,
) -> AppResult<()> {
    if let Err(e) = mailer.send(message).await {
        tracing::warn!("Withdrawing {} token for {}: {}", purpose, user.id, e);
        store.save_token(&user.id, purpose, None).await?;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BcryptHasher;
    use crate::engine::{relationships, testing};
    use crate::mail::{Email, MailError, MemoryMailer};
    use async_trait::async_trait;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            Err(MailError {
                to: email.to.clone(),
                reason: "smtp down".into(),
            })
        }
    }

    fn hasher() -> BcryptHasher {
        BcryptHasher::new(4)
    }

    fn links() -> LinkSettings {
        LinkSettings {
            public_url: "http://localhost:3000".into(),
            token_ttl: Duration::minutes(10),
        }
    }

    fn alice() -> Registration {
        Registration {
            username: "alice".into(),
            email: "A@X.com".into(),
            password: "secret1".into(),
        }
    }

    /// The plaintext token is the last path segment of the mailed link.
    fn token_from(mailer: &MemoryMailer, path: &str) -> String {
        let html = mailer.last().unwrap().html;
        let start = html.find(path).unwrap() + path.len() + 1;
        html[start..].chars().take_while(|c| c.is_ascii_hexdigit()).collect()
    }

    #[tokio::test]
    async fn register_defaults_and_uniqueness() {
        let t = testing::store();
        let user = register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.role, Role::User);
        assert!(!user.is_verified);
        assert_eq!(user.gender, Gender::PreferNotToSay);
        assert_eq!(user.account_level, AccountLevel::Bronze);

        let err = register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let same_email = Registration {
            username: "alicia".into(),
            ..alice()
        };
        let err = register(&t.store, &hasher(), &same_email, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_validates_every_field() {
        let t = testing::store();
        let input = Registration {
            username: "a".into(),
            email: "nope".into(),
            password: "123".into(),
        };
        match register(&t.store, &hasher(), &input, Utc::now()).await.unwrap_err() {
            AppError::Validation(errors) => assert_eq!(errors.fields().len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let t = testing::store();
        let signer = TokenSigner::new("s", Duration::days(90));
        register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap();

        let now = Utc::now();
        let (user, token) = login(&t.store, &hasher(), &signer, "alice", "secret1", now).await.unwrap();
        assert_eq!(signer.verify(&token, now).unwrap().sub, user.id);
        let stored = t.store.find_user(&user.id).await.unwrap().unwrap();
        assert!(stored.last_login.is_some());

        let err = login(&t.store, &hasher(), &signer, "alice", "wrong1", now).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err = login(&t.store, &hasher(), &signer, "nobody", "secret1", now).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err = login(&t.store, &hasher(), &signer, "", "", now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn profile_lists_relationships() {
        let t = testing::store();
        let a = testing::user(&t.store, "alice").await;
        let b = testing::user(&t.store, "bob").await;
        let now = Utc::now();
        relationships::follow(&t.store, &b.id, &a.id, now).await.unwrap();
        relationships::block(&t.store, &a.id, &b.id, now).await.unwrap();
        relationships::record_profile_view(&t.store, &b.id, &a.id, now).await.unwrap();

        let p = profile(&t.store, &a.id).await.unwrap();
        assert_eq!(p.followers, vec![b.id.clone()]);
        assert!(p.following.is_empty());
        assert_eq!(p.blocked_users, vec![b.id.clone()]);
        assert_eq!(p.profile_viewers, vec![b.id.clone()]);

        let public = public_profile(&t.store, &b.id, &a.id, now).await.unwrap();
        assert_eq!(public.followers_count, 1);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("email").is_none());
    }

    #[tokio::test]
    async fn update_profile_enforces_uniqueness() {
        let t = testing::store();
        let a = testing::user(&t.store, "alice").await;
        testing::user(&t.store, "bob").await;

        let update = ProfileUpdate {
            bio: Some("  writer  ".into()),
            gender: Some("non-binary".into()),
            username: Some("alice".into()),
            ..Default::default()
        };
        let user = update_profile(&t.store, &a.id, &update, Utc::now()).await.unwrap();
        assert_eq!(user.bio.as_deref(), Some("writer"));
        assert_eq!(user.gender, Gender::NonBinary);

        let taken = ProfileUpdate {
            username: Some("bob".into()),
            ..Default::default()
        };
        let err = update_profile(&t.store, &a.id, &taken, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let taken = ProfileUpdate {
            email: Some("BOB@x.com".into()),
            ..Default::default()
        };
        let err = update_profile(&t.store, &a.id, &taken, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_reset_flow() {
        let t = testing::store();
        let signer = TokenSigner::new("s", Duration::days(90));
        let mailer = MemoryMailer::new();
        register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap();

        let now = Utc::now();
        forgot_password(&t.store, &mailer, &links(), "a@x.com", now).await.unwrap();
        let token = token_from(&mailer, "reset-password");

        let err = reset_password(&t.store, &hasher(), &token, "123", now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        reset_password(&t.store, &hasher(), &token, "newsecret", now).await.unwrap();
        login(&t.store, &hasher(), &signer, "alice", "newsecret", now).await.unwrap();
        assert!(login(&t.store, &hasher(), &signer, "alice", "secret1", now).await.is_err());

        let err = reset_password(&t.store, &hasher(), &token, "another1", now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn forgot_password_unknown_email_and_mail_failure() {
        let t = testing::store();
        let user = register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap();

        let err = forgot_password(&t.store, &MemoryMailer::new(), &links(), "z@x.com", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = forgot_password(&t.store, &FailingMailer, &links(), "a@x.com", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Mail(_)));
        let stored = t.store.find_user(&user.id).await.unwrap().unwrap();
        assert!(stored.password_reset.is_none());
    }

    #[tokio::test]
    async fn verification_flow() {
        let t = testing::store();
        let mailer = MemoryMailer::new();
        let user = register(&t.store, &hasher(), &alice(), Utc::now()).await.unwrap();
        let now = Utc::now();

        send_verification_email(&t.store, &mailer, &links(), &user.id, now).await.unwrap();
        let token = token_from(&mailer, "verify-account");

        let verified = verify_account(&t.store, &token, now).await.unwrap();
        assert!(verified.is_verified);

        let err = verify_account(&t.store, &token, now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOrExpiredToken));

        let err = send_verification_email(&t.store, &mailer, &links(), &user.id, now).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
