use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use crypto_core::jwt::JwtManager;
use db_pool::{create_pool, run_migrations, DbConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use learningpulse_gateway::config::{Config, ServerConfig, StorageBackend, StorageConfig};
use learningpulse_gateway::db::{DynStore, MemoryStore, PgStore, MIGRATOR};
use learningpulse_gateway::jobs::{
    run_job_loop, DailySchedule, InactiveUserReminderJob, JobContext,
};
use learningpulse_gateway::middleware::{JwtMiddleware, RateLimitConfig, RateLimitMiddleware};
use learningpulse_gateway::schema::build_schema;
use learningpulse_gateway::services::EmailService;
use learningpulse_gateway::{handlers, init_tracing, rest_api};

const SERVICE_NAME: &str = "learningpulse-gateway";

async fn open_store(storage: &StorageConfig) -> anyhow::Result<DynStore> {
    match storage.backend {
        StorageBackend::Postgres => {
            let db_config = DbConfig::new(
                SERVICE_NAME,
                &storage.database_url,
                storage.max_connections,
                storage.min_connections,
            );
            db_config.log_config();

            let pool = create_pool(db_config)
                .await
                .context("Failed to connect to PostgreSQL")?;
            if storage.run_migrations {
                run_migrations(&pool, &MIGRATOR)
                    .await
                    .context("Failed to run database migrations")?;
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_cors(server: &ServerConfig) -> Cors {
    let mut cors = Cors::default();
    for origin in &server.cors_allowed_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }
    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting LearningPulse gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = open_store(&config.storage).await?;
    info!(backend = ?config.storage.backend, "Store initialized");

    let jwt = Arc::new(
        JwtManager::new(
            &config.jwt.secret,
            &config.jwt.issuer,
            config.jwt.expiry_seconds,
        )
        .context("Invalid JWT configuration")?,
    );
    info!(
        issuer = %config.jwt.issuer,
        expiry_seconds = config.jwt.expiry_seconds,
        "JWT authentication enabled with HS256"
    );

    let email = EmailService::from_config(&config.email).context("Invalid email configuration")?;

    let schema = build_schema(store.clone(), jwt.clone(), email.clone(), &config.graphql);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let job_handle = if config.reminders.enabled {
        let job = InactiveUserReminderJob::new(
            DailySchedule::new(config.reminders.hour_utc, config.reminders.minute_utc),
            config.reminders.inactivity_days,
        );
        Some(tokio::spawn(run_job_loop(
            Arc::new(job),
            JobContext::new(store.clone(), email.clone()),
            shutdown_tx.subscribe(),
        )))
    } else {
        info!("Inactive user reminders disabled");
        None
    };

    let rate_limiter = RateLimitMiddleware::new(RateLimitConfig::from(config.rate_limit));
    info!(
        per_second = config.rate_limit.per_second,
        burst = config.rate_limit.burst,
        trust_proxy_headers = config.rate_limit.trust_proxy_headers,
        "Rate limiting enabled per client IP"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("LearningPulse gateway starting on http://{}", bind_addr);

    let server_config = config.server.clone();
    let playground = config.graphql.playground;

    HttpServer::new(move || {
        App::new()
            // Last wrap runs first: tracing span, CORS, rate limit, then auth
            .wrap(JwtMiddleware::new(jwt.clone()))
            .wrap(rate_limiter.clone())
            .wrap(build_cors(&server_config))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(schema.clone()))
            .app_data(web::Data::new(email.clone()))
            .configure(|cfg| handlers::configure(cfg, playground))
            .configure(rest_api::configure)
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("HTTP server stopped, shutting down background jobs");
    let _ = shutdown_tx.send(());
    if let Some(handle) = job_handle {
        let _ = handle.await;
    }

    Ok(())
}
