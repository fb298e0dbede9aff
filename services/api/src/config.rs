use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::auth::google::GoogleConfig;
use crate::db::DbConfig;
use crate::media::CloudinaryConfig;
use crate::notify::SmtpConfig;
use crate::retention::{RetentionConfig, MAX_RETENTION_DAYS};

const DEV_JWT_SECRET: &str = "campusconnect-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub database: DbConfig,
    pub jwt_secret: String,
    /// Base URL of the web client, used for redirects and email links.
    pub client_url: String,
    /// Public URL of this API, used to build the OAuth callback.
    pub public_url: String,
    pub retention: RetentionConfig,
    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub google: Option<GoogleConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = var("CAMPUS_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
            .parse()
            .context("CAMPUS_LISTEN_ADDR must be a socket address")?;

        let log_level = var("CAMPUS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = var("CAMPUS_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let jwt_secret = match var("CAMPUS_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if dev_mode => DEV_JWT_SECRET.to_string(),
            None => bail!("CAMPUS_JWT_SECRET is required outside dev mode"),
        };

        let db_defaults = DbConfig::default();
        let database = DbConfig {
            database_url: var("DATABASE_URL").unwrap_or(db_defaults.database_url),
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", db_defaults.max_connections)?,
            min_connections: parse_or(&var, "DB_MIN_CONNECTIONS", db_defaults.min_connections)?,
            acquire_timeout: Duration::from_secs(parse_or(
                &var,
                "DB_ACQUIRE_TIMEOUT_SECS",
                db_defaults.acquire_timeout.as_secs(),
            )?),
            migrations_dir: var("CAMPUS_MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(db_defaults.migrations_dir),
        };
        if database.max_connections == 0 || database.min_connections > database.max_connections {
            bail!("DB_MIN_CONNECTIONS must not exceed DB_MAX_CONNECTIONS, which must be positive");
        }

        let client_url = trim_url(var("CAMPUS_CLIENT_URL"), "http://localhost:3000");
        let public_url = trim_url(var("CAMPUS_PUBLIC_URL"), "http://localhost:5000");

        let defaults = RetentionConfig::default();
        let retention = RetentionConfig {
            retention_days: parse_or(&var, "CAMPUS_RETENTION_DAYS", defaults.retention_days)?,
            sweep_hour_utc: parse_or(&var, "CAMPUS_SWEEP_HOUR_UTC", defaults.sweep_hour_utc)?,
        };
        if retention.sweep_hour_utc > 23 {
            bail!("CAMPUS_SWEEP_HOUR_UTC must be between 0 and 23");
        }
        if retention.retention_days > MAX_RETENTION_DAYS {
            bail!("CAMPUS_RETENTION_DAYS must be at most {MAX_RETENTION_DAYS}");
        }

        let smtp = match (var("SMTP_HOST"), var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                port: parse_or(&var, "SMTP_PORT", 465)?,
                from: var("SMTP_FROM").unwrap_or_else(|| format!("CampusConnect <{username}>")),
                host,
                username,
                password,
            }),
            _ => None,
        };

        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri: format!("{public_url}/v1/auth/google/callback"),
            }),
            _ => None,
        };

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            database,
            jwt_secret,
            client_url,
            public_url,
            retention,
            smtp,
            cloudinary,
            google,
        })
    }
}

fn trim_url(value: Option<String>, default: &str) -> String {
    value
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_dev_defaults() {
        let config = config(&[("CAMPUS_DEV", "true")]).unwrap();
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.client_url, "http://localhost:3000");
        assert_eq!(config.retention.retention_days, 30);
        assert!(config.smtp.is_none());
        assert!(config.cloudinary.is_none());
        assert!(config.google.is_none());
    }

    #[test]
    fn test_secret_required_outside_dev() {
        assert!(config(&[]).is_err());
        assert!(config(&[("CAMPUS_JWT_SECRET", "s3cret")]).is_ok());
    }

    #[test]
    fn test_google_callback_uses_public_url() {
        let config = config(&[
            ("CAMPUS_DEV", "1"),
            ("CAMPUS_PUBLIC_URL", "https://api.campus.edu/"),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.google.unwrap().redirect_uri,
            "https://api.campus.edu/v1/auth/google/callback"
        );
    }

    #[test]
    fn test_smtp_from_defaults_to_username() {
        let config = config(&[
            ("CAMPUS_DEV", "1"),
            ("SMTP_HOST", "smtp.campus.edu"),
            ("SMTP_USERNAME", "noreply@campus.edu"),
            ("SMTP_PASSWORD", "pw"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.from, "CampusConnect <noreply@campus.edu>");
    }

    #[test]
    fn test_database_settings() {
        let config = config(&[
            ("CAMPUS_DEV", "1"),
            ("DATABASE_URL", "postgres://db.campus.edu/events"),
            ("DB_MAX_CONNECTIONS", "20"),
            ("DB_ACQUIRE_TIMEOUT_SECS", "2"),
            ("CAMPUS_MIGRATIONS_DIR", "/opt/campus/migrations"),
        ])
        .unwrap();
        assert_eq!(config.database.database_url, "postgres://db.campus.edu/events");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(2));
        assert_eq!(
            config.database.migrations_dir,
            PathBuf::from("/opt/campus/migrations")
        );
    }

    #[test]
    fn test_rejects_bad_pool_sizes() {
        assert!(config(&[("CAMPUS_DEV", "1"), ("DB_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("CAMPUS_DEV", "1"), ("DB_MAX_CONNECTIONS", "0")]).is_err());
        assert!(config(&[
            ("CAMPUS_DEV", "1"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("DB_MIN_CONNECTIONS", "5"),
        ])
        .is_err());
    }

    #[test]
    fn test_retention_days_are_bounded() {
        let config_at_cap = config(&[("CAMPUS_DEV", "true"), ("CAMPUS_RETENTION_DAYS", "36500")]);
        assert_eq!(config_at_cap.unwrap().retention.retention_days, 36_500);
        assert!(config(&[("CAMPUS_DEV", "true"), ("CAMPUS_RETENTION_DAYS", "200000000")]).is_err());
    }

    #[test]
    fn test_rejects_bad_sweep_hour() {
        assert!(config(&[("CAMPUS_DEV", "1"), ("CAMPUS_SWEEP_HOUR_UTC", "24")]).is_err());
    }
}
