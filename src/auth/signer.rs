// Bearer tokens: hex(json claims) "." hex(hmac-sha256(claims))
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token has expired")]
    Expired,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Arc<Vec<u8>>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            key: Arc::new(secret.as_ref().to_vec()),
            ttl,
        }
    }

    /// Random secret for when none is configured. Tokens die with the process.
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("invalid signing key: {}", e)))
    }

    pub fn sign(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", hex::encode(payload), hex::encode(signature)))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SignatureError> {
        let (payload_hex, signature_hex) = token.split_once('.').ok_or(SignatureError::Malformed)?;
        let payload = hex::decode(payload_hex).map_err(|_| SignatureError::Malformed)?;
        let signature = hex::decode(signature_hex).map_err(|_| SignatureError::Malformed)?;

        let mut mac = self.mac().map_err(|_| SignatureError::BadSignature)?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| SignatureError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(SignatureError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::days(90))
    }

    #[test]
    fn sign_then_verify() {
        let now = Utc::now();
        let token = signer().sign("user-1", now).unwrap();
        let claims = signer().verify(&token, now).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, Duration::days(90).num_seconds());
    }

    #[test]
    fn rejects_foreign_key() {
        let now = Utc::now();
        let token = TokenSigner::new("other", Duration::days(1)).sign("user-1", now).unwrap();
        assert_eq!(signer().verify(&token, now), Err(SignatureError::BadSignature));
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = Utc::now();
        let token = signer().sign("user-1", now).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged = serde_json::to_vec(&Claims {
            sub: "admin".into(),
            iat: now.timestamp(),
            exp: now.timestamp() + 1000,
        })
        .unwrap();
        let forged = format!("{}.{}", hex::encode(forged), sig);
        assert_eq!(signer().verify(&forged, now), Err(SignatureError::BadSignature));
    }

    #[test]
    fn rejects_expired_and_garbage() {
        let now = Utc::now();
        let token = signer().sign("user-1", now).unwrap();
        assert_eq!(
            signer().verify(&token, now + Duration::days(91)),
            Err(SignatureError::Expired)
        );
        assert_eq!(signer().verify("nodot", now), Err(SignatureError::Malformed));
        assert_eq!(signer().verify("zz.zz", now), Err(SignatureError::Malformed));
    }
}
