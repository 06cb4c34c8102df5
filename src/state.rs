use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{CredentialHasher, TokenSigner};
use crate::config::Config;
use crate::engine::accounts::LinkSettings;
use crate::mail::DynMailer;
use crate::store::DynStore;
use crate::uploads::DynUploadStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Arc<Config>,
    pub signer: TokenSigner,
    pub hasher: Arc<dyn CredentialHasher>,
    pub mailer: DynMailer,
    pub uploads: DynUploadStore,
}

impl AppState {
    pub fn links(&self) -> LinkSettings {
        LinkSettings {
            public_url: self.config.server.public_url.clone(),
            token_ttl: self.config.token_ttl(),
        }
    }
}
