// Token lifecycle - single-use, time-limited secrets for password reset and
// account verification. Only the SHA-256 of a token is ever stored.
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::db::models::{TokenPurpose, TokenSlot, User};
use crate::error::{AppError, AppResult};
use crate::store::Store;

const TOKEN_BYTES: usize = 32;

pub fn generate_plaintext() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Returns the plaintext for out-of-band delivery and the user carrying the
/// new slot. Any earlier token of the same purpose is replaced.
pub fn issue_token(user: &User, purpose: TokenPurpose, now: DateTime<Utc>, ttl: Duration) -> (String, User) {
    let plaintext = generate_plaintext();
    let mut updated = user.clone();
    *updated.token_slot_mut(purpose) = Some(TokenSlot {
        hash: hash_token(&plaintext),
        expires_at: now + ttl,
    });
    (plaintext, updated)
}

/// Does `plaintext` match the user's live token for `purpose`?
pub fn token_matches(user: &User, purpose: TokenPurpose, plaintext: &str, now: DateTime<Utc>) -> bool {
    match user.token_slot(purpose) {
        Some(slot) => slot.hash == hash_token(plaintext) && slot.expires_at > now,
        None => false,
    }
}

/// Pure consume: the user with the slot cleared, or an error.
pub fn consume_token(
    user: &User,
    purpose: TokenPurpose,
    plaintext: &str,
    now: DateTime<Utc>,
) -> AppResult<User> {
    if !token_matches(user, purpose, plaintext, now) {
        return Err(AppError::InvalidOrExpiredToken);
    }
    let mut updated = user.clone();
    *updated.token_slot_mut(purpose) = None;
    Ok(updated)
}

/// Issue and persist a token. Returns the plaintext.
pub async fn issue(
    store: &dyn Store,
    user: &User,
    purpose: TokenPurpose,
    now: DateTime<Utc>,
    ttl: Duration,
) -> AppResult<String> {
    let (plaintext, updated) = issue_token(user, purpose, now, ttl);
    store
        .save_token(&user.id, purpose, updated.token_slot(purpose))
        .await?;
    tracing::info!("Issued {} token for user {}", purpose, user.id);
    Ok(plaintext)
}

/// Look the token up by hash, check expiry, and clear it. The clear only
/// succeeds for one caller, so a token is never honoured twice.
pub async fn consume(
    store: &dyn Store,
    purpose: TokenPurpose,
    plaintext: &str,
    now: DateTime<Utc>,
) -> AppResult<User> {
    let hash = hash_token(plaintext);
    let user = store
        .find_user_by_token(purpose, &hash)
        .await?
        .ok_or(AppError::InvalidOrExpiredToken)?;

    let updated = consume_token(&user, purpose, plaintext, now)?;

    if !store.clear_token(&user.id, purpose, &hash).await? {
        return Err(AppError::InvalidOrExpiredToken);
    }
    tracing::info!("Consumed {} token for user {}", purpose, user.id);
    Ok(updated)
}
