//! CampusConnect API server.
//!
//! `serve` runs the REST API together with the side-effect runner and the
//! daily retention sweep. `sweep`, `migrate` and `create-admin` are one-shot
//! maintenance commands against the configured database.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use campus_api::{
    api,
    auth::{google::GoogleOAuth, jwt::TokenSigner, password},
    config::Config,
    db::{Database, NewUser},
    media::{CloudinaryHost, DisabledImageHost, ImageHost},
    model::Role,
    notify::{LogMailer, Mailer, SmtpMailer},
    retention::{run_sweep, RetentionWorker},
    side_effects::SideEffects,
    state::{AppServices, AppState},
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// CampusConnect event registration service.
#[derive(Debug, Parser)]
#[command(name = "campus-api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and background workers (default).
    Serve,

    /// Run one retention sweep now and print the report as JSON.
    Sweep,

    /// Apply pending database migrations.
    Migrate,

    /// Create an admin account. Admins cannot self-register.
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "CAMPUS_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to CAMPUS_LOG_LEVEL.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Sweep => sweep(config, db).await,
        Command::Migrate => {
            db.run_migrations().await?;
            Ok(())
        }
        Command::CreateAdmin {
            name,
            email,
            password,
        } => create_admin(db, name, email, password).await,
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")
}

fn image_host(config: &Config, http: &reqwest::Client) -> Arc<dyn ImageHost> {
    match &config.cloudinary {
        Some(cloudinary) => Arc::new(CloudinaryHost::new(cloudinary.clone(), http.clone())),
        None => {
            warn!("Image host not configured; poster uploads are disabled");
            Arc::new(DisabledImageHost)
        }
    }
}

fn mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) if !config.dev_mode => Ok(Arc::new(SmtpMailer::new(smtp)?)),
        _ => {
            info!("Using log mailer; emails are written to the log");
            Ok(Arc::new(LogMailer))
        }
    }
}

async fn serve(config: Config, db: Database) -> Result<()> {
    info!(listen_addr = %config.listen_addr, "Starting CampusConnect API");

    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    let http = http_client()?;
    let images = image_host(&config, &http);
    let google = config
        .google
        .clone()
        .map(|google| GoogleOAuth::new(google, http.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (effects, effects_worker) = SideEffects::new(mailer(&config)?, images.clone());
    let effects_handle = tokio::spawn(effects_worker.run(shutdown_rx.clone()));

    let retention_worker = RetentionWorker::new(db.clone(), images.clone(), config.retention.clone());
    let retention_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            retention_worker.run(shutdown_rx).await;
        }
    });

    let state = AppState::new(AppServices {
        db,
        tokens: TokenSigner::new(config.jwt_secret.as_bytes()),
        effects,
        images,
        google,
        client_url: config.client_url.clone(),
    });

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");

    if let Err(e) = tokio::time::timeout(SHUTDOWN_TIMEOUT, retention_handle).await {
        warn!(error = %e, "Retention worker did not shut down in time");
    }

    if let Err(e) = tokio::time::timeout(SHUTDOWN_TIMEOUT, effects_handle).await {
        warn!(error = %e, "Side-effect worker did not drain in time");
    }

    info!("CampusConnect API shutdown complete");
    Ok(())
}

async fn sweep(config: Config, db: Database) -> Result<()> {
    let http = http_client()?;
    let images = image_host(&config, &http);

    let report = run_sweep(&db, images.as_ref(), &config.retention, Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn create_admin(db: Database, name: String, email: String, password: String) -> Result<()> {
    if password.chars().count() < password::MIN_PASSWORD_LEN {
        bail!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LEN
        );
    }

    let password_hash = password::hash_password(&password).await?;
    let user = db
        .users()
        .create(NewUser {
            name,
            email,
            password_hash: Some(password_hash),
            role: Role::Admin,
            organization: None,
        })
        .await
        .context("failed to create admin account")?;

    info!(user_id = %user.id, "Admin account created");
    println!("{}", user.id);
    Ok(())
}
