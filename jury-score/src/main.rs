//! jury-score: scoring service for competition juries
//!
//! Serves the jury REST API over a local SQLite database. Configuration is resolved
//! CLI → environment (`JURY_*`) → TOML file → defaults.

use anyhow::{Context, Result};
use clap::Parser;
use jury_common::api::{hash_password, load_signing_secret, Role, TokenService};
use jury_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use jury_score::{build_router, cors_layer, db, AppState};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jury-score", version, about = "Jury scoring service")]
struct Args {
    /// TOML config file (default: ~/.config/jury/config.toml, then /etc/jury/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    database_path: Option<PathBuf>,

    #[arg(long)]
    bind_address: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Lifetime of issued bearer tokens
    #[arg(long)]
    token_ttl_minutes: Option<i64>,

    /// Create this admin on startup when no admin account exists
    #[arg(long, env = "JURY_BOOTSTRAP_ADMIN_EMAIL", requires = "bootstrap_admin_password")]
    bootstrap_admin_email: Option<String>,

    #[arg(long, env = "JURY_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    bootstrap_admin_password: Option<String>,

    #[arg(long, env = "JURY_BOOTSTRAP_ADMIN_NAME", default_value = "Administrator")]
    bootstrap_admin_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref())?;
    let config = ServiceConfig::resolve(
        &ConfigOverrides {
            database_path: args.database_path.clone(),
            bind_address: args.bind_address.clone(),
            port: args.port,
            token_ttl_minutes: args.token_ttl_minutes,
        },
        &toml_config,
    )?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting jury-score v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database path: {}", config.database_path.display());

    let pool = match jury_common::db::init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let secret = load_signing_secret(&pool)
        .await
        .context("Failed to load token signing secret")?;
    let tokens = TokenService::new(secret.as_bytes(), config.token_ttl_minutes);
    info!("✓ Loaded token signing secret");

    bootstrap_admin(&pool, &args).await?;

    let state = AppState::new(pool, tokens);
    let app = build_router(state).layer(cors_layer(&config.cors_origins));

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("jury-score listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the bootstrap admin unless an admin already exists
async fn bootstrap_admin(pool: &SqlitePool, args: &Args) -> Result<()> {
    let (Some(email), Some(password)) = (&args.bootstrap_admin_email, &args.bootstrap_admin_password)
    else {
        if db::users::count_by_role(pool, Role::Admin).await? == 0 {
            warn!("No admin account exists; pass --bootstrap-admin-email/--bootstrap-admin-password to create one");
        }
        return Ok(());
    };

    if db::users::count_by_role(pool, Role::Admin).await? > 0 {
        info!("Admin account present, skipping bootstrap");
        return Ok(());
    }

    let password_hash = hash_password(password)?;
    let admin = db::users::create_user(
        pool,
        &args.bootstrap_admin_name,
        email,
        &password_hash,
        Role::Admin,
    )
    .await?;
    info!(user_id = admin.id, email = %admin.email, "Bootstrap admin created");

    Ok(())
}
