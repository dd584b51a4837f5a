//! Configuration for the LearningPulse gateway
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub graphql: GraphQLConfig,
    pub email: EmailConfig,
    pub reminders: ReminderConfig,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown STORAGE_BACKEND '{other}' (expected postgres or memory)"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub expiry_seconds: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLConfig {
    /// Enable GraphQL Playground
    pub playground: bool,
    /// Max query depth
    pub max_depth: usize,
    /// Max query complexity
    pub max_complexity: usize,
    /// Enable introspection
    pub introspection: bool,
}

impl Default for GraphQLConfig {
    fn default() -> Self {
        Self {
            playground: true,
            max_depth: 10,
            max_complexity: 1000,
            introspection: true,
        }
    }
}

/// SMTP settings; an empty host puts the mailer in no-op mode
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub use_starttls: bool,
    pub app_base_url: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[REDACTED]"))
            .field("from_address", &self.from_address)
            .field("use_starttls", &self.use_starttls)
            .field("app_base_url", &self.app_base_url)
            .finish()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "LearningPulse <no-reply@learningpulse.local>".to_string(),
            use_starttls: true,
            app_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub hour_utc: u32,
    pub minute_utc: u32,
    pub inactivity_days: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub per_second: u32,
    pub burst: u32,
    /// Key clients by `X-Forwarded-For` / `Forwarded`; only safe behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

/// Parse an optional env var, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the environment, reading `.env` first when present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let storage = Self::storage_from_env()?;
        let jwt = Self::jwt_from_env()?;
        let reminders = Self::reminders_from_env()?;

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("SERVER_PORT", 4000),
                workers: env_or("SERVER_WORKERS", num_cpus::get()),
                cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            storage,
            jwt,
            graphql: GraphQLConfig {
                playground: env_or("GRAPHQL_PLAYGROUND", true),
                max_depth: env_or("GRAPHQL_MAX_DEPTH", 10),
                max_complexity: env_or("GRAPHQL_MAX_COMPLEXITY", 1000),
                introspection: env_or("GRAPHQL_INTROSPECTION", true),
            },
            email: Self::email_from_env(),
            reminders,
            rate_limit: RateLimitSettings {
                per_second: env_or("RATE_LIMIT_PER_SECOND", 50),
                burst: env_or("RATE_LIMIT_BURST", 20),
                trust_proxy_headers: env_or("RATE_LIMIT_TRUST_PROXY", false),
            },
        })
    }

    fn storage_from_env() -> Result<StorageConfig> {
        let backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").unwrap_or_default();
        if backend == StorageBackend::Postgres && database_url.is_empty() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        Ok(StorageConfig {
            backend,
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            run_migrations: env_or("DB_RUN_MIGRATIONS", true),
        })
    }

    fn jwt_from_env() -> Result<JwtConfig> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.len() < crypto_core::jwt::MIN_SECRET_BYTES {
            bail!(
                "JWT_SECRET must be at least {} bytes",
                crypto_core::jwt::MIN_SECRET_BYTES
            );
        }

        let expiry_seconds = env::var("JWT_EXPIRY_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .context("Invalid JWT_EXPIRY_SECONDS")?;

        Ok(JwtConfig {
            secret,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "learningpulse".to_string()),
            expiry_seconds,
        })
    }

    fn email_from_env() -> EmailConfig {
        let defaults = EmailConfig::default();
        EmailConfig {
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: env_or("SMTP_PORT", defaults.smtp_port),
            smtp_username: env_opt("SMTP_USERNAME"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            from_address: env_opt("SMTP_FROM").unwrap_or(defaults.from_address),
            use_starttls: env_or("SMTP_STARTTLS", true),
            app_base_url: env_opt("APP_BASE_URL").unwrap_or(defaults.app_base_url),
        }
    }

    fn reminders_from_env() -> Result<ReminderConfig> {
        let config = ReminderConfig {
            enabled: env_or("REMINDER_ENABLED", true),
            hour_utc: env_or("REMINDER_HOUR_UTC", 9),
            minute_utc: env_or("REMINDER_MINUTE_UTC", 0),
            inactivity_days: env_or("REMINDER_INACTIVITY_DAYS", 7),
        };
        if config.hour_utc > 23 || config.minute_utc > 59 {
            bail!(
                "Invalid reminder time {:02}:{:02} UTC",
                config.hour_utc,
                config.minute_utc
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "JWT_SECRET",
        "JWT_ISSUER",
        "JWT_EXPIRY_SECONDS",
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "SERVER_PORT",
        "CORS_ALLOWED_ORIGINS",
        "SMTP_HOST",
        "REMINDER_HOUR_UTC",
        "RATE_LIMIT_TRUST_PROXY",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear();
        env::set_var("JWT_SECRET", "test-secret-key-0123456789");
        env::set_var("STORAGE_BACKEND", "memory");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.jwt.issuer, "learningpulse");
        assert_eq!(config.jwt.expiry_seconds, 3600);
        assert_eq!(config.graphql.max_depth, 10);
        assert!(config.email.smtp_host.is_empty());
        assert_eq!(config.reminders.hour_utc, 9);
        assert_eq!(config.reminders.inactivity_days, 7);
        assert_eq!(config.rate_limit.per_second, 50);
        assert!(!config.rate_limit.trust_proxy_headers);

        clear();
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env() {
        clear();
        env::set_var("JWT_SECRET", "test-secret-key-0123456789");
        env::set_var("JWT_ISSUER", "test-issuer");
        env::set_var("JWT_EXPIRY_SECONDS", "7200");

        let config = Config::jwt_from_env().unwrap();

        assert_eq!(config.secret, "test-secret-key-0123456789");
        assert_eq!(config.issuer, "test-issuer");
        assert_eq!(config.expiry_seconds, 7200);
        assert!(!format!("{:?}", config).contains("0123456789"));

        clear();
    }

    #[test]
    #[serial]
    fn test_short_jwt_secret_rejected() {
        clear();
        env::set_var("JWT_SECRET", "short");
        assert!(Config::jwt_from_env().is_err());
        clear();
    }

    #[test]
    #[serial]
    fn test_postgres_requires_database_url() {
        clear();
        env::set_var("STORAGE_BACKEND", "postgres");
        assert!(Config::storage_from_env().is_err());

        env::set_var("DATABASE_URL", "postgres://localhost/learningpulse");
        let storage = Config::storage_from_env().unwrap();
        assert_eq!(storage.backend, StorageBackend::Postgres);
        assert!(storage.run_migrations);
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_reminder_hour() {
        clear();
        env::set_var("REMINDER_HOUR_UTC", "24");
        assert!(Config::reminders_from_env().is_err());
        clear();
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(
            "Memory".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("mongo".parse::<StorageBackend>().is_err());
    }
}
