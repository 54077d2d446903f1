use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use msgboard::auth::SessionKeys;
use msgboard::config::AppConfig;
use msgboard::rate_limit::RateLimiterFacade;
use msgboard::repo::Repo;
use msgboard::{config, AppState, SecurityHeaders};

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable one of the `inmem-store` or `postgres-store` features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Environment normally comes from the shell / container; .env is a
    // convenience for local debug builds only.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration (see .env.example)")?;
    info!("Bootstrapping message board");
    info!(bind = %cfg.bind_addr, hsts = cfg.enable_hsts, secure_cookie = cfg.cookie_secure, "configuration loaded");

    let repo = build_repo(&cfg).await?;
    let state = AppState {
        repo,
        sessions: SessionKeys::from_config(&cfg),
        rate_limiter: Some(RateLimiterFacade::new(cfg.rate_limit.clone())),
    };

    let cors_origins = cfg.cors_origins.clone();
    let enable_hsts = cfg.enable_hsts;
    let server = HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |c, origin| c.allowed_origin(origin))
            .allowed_methods(["GET", "POST", "PATCH", "DELETE"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::default().with_hsts(enable_hsts))
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
    })
    .bind(cfg.bind_addr.as_str())
    .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use msgboard::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(db_url)
        .context("failed to create Postgres pool")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("failed to run migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use msgboard::repo::inmem::InMemRepo;

    info!(data_dir = %cfg.data_dir.display(), "Using in-memory repository backend");
    Ok(Arc::new(InMemRepo::with_data_dir(&cfg.data_dir)))
}
