// Outbound mail - a narrow sender contract plus the message builders
use askama::Template;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
#[error("mail delivery to {to} failed: {reason}")]
pub struct MailError {
    pub to: String,
    pub reason: String,
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Mail(err.to_string())
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Writes mail to the log instead of delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(from = %self.from, to = %email.to, subject = %email.subject, "Sending mail");
        tracing::debug!("Mail body:\n{}", email.html);
        Ok(())
    }
}

/// Keeps every sent message in memory.
#[derive(Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Email> {
        self.sent().pop()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut sent = self.sent.lock().map_err(|_| MailError {
            to: email.to.clone(),
            reason: "mailbox poisoned".to_string(),
        })?;
        sent.push(email.clone());
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetTemplate<'a> {
    username: &'a str,
    link: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/account_verification.html")]
struct AccountVerificationTemplate<'a> {
    username: &'a str,
    link: &'a str,
    ttl_minutes: i64,
}

fn link(public_url: &str, path: &str, token: &str) -> String {
    format!("{}/{}/{}", public_url.trim_end_matches('/'), path, token)
}

pub fn password_reset_email(
    to: &str,
    username: &str,
    public_url: &str,
    token: &str,
    ttl_minutes: i64,
) -> AppResult<Email> {
    let link = link(public_url, "reset-password", token);
    let html = PasswordResetTemplate {
        username,
        link: &link,
        ttl_minutes,
    }
    .render()
    .map_err(|e| AppError::Internal(format!("template error: {}", e)))?;

    Ok(Email {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        html,
    })
}

pub fn account_verification_email(
    to: &str,
    username: &str,
    public_url: &str,
    token: &str,
    ttl_minutes: i64,
) -> AppResult<Email> {
    let link = link(public_url, "verify-account", token);
    let html = AccountVerificationTemplate {
        username,
        link: &link,
        ttl_minutes,
    }
    .render()
    .map_err(|e| AppError::Internal(format!("template error: {}", e)))?;

    Ok(Email {
        to: to.to_string(),
        subject: "Account Verification".to_string(),
        html,
    })
}
