use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wordsmith::auth::{BcryptHasher, TokenSigner};
use wordsmith::config::{Cli, Config, JWT_SECRET_ENV};
use wordsmith::mail::LogMailer;
use wordsmith::state::AppState;
use wordsmith::store::SqliteStore;
use wordsmith::uploads::LocalUploadStore;
use wordsmith::{db, error, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if !error::set_production_mode(config.server.production) {
        tracing::warn!("Production mode was already set");
    }

    // Ensure uploads directory exists
    let uploads_dir = config.uploads_path();
    std::fs::create_dir_all(&uploads_dir)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "No signing secret configured (set {} or auth.jwt_secret); tokens will not survive a restart",
                JWT_SECRET_ENV
            );
            TokenSigner::generate_secret()
        }
    };

    // Build app state
    let state = AppState {
        store: Arc::new(SqliteStore::new(pool)),
        signer: TokenSigner::new(secret, config.jwt_ttl()),
        hasher: Arc::new(BcryptHasher::new(config.auth.bcrypt_cost)),
        mailer: Arc::new(LogMailer::new(config.mail.from.clone())),
        uploads: Arc::new(LocalUploadStore::new(
            uploads_dir.clone(),
            config.server.public_url.clone(),
        )),
        config: Arc::new(config.clone()),
    };

    let app = routes::app(state, &uploads_dir);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
