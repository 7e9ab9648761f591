use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adland::config::{load_routes, Config, DatabaseBackend};
use adland::filter::{create_filter_router, FilterState, Router};
use adland::geo::GeoIpService;
use adland::storage::{PostgresStorage, SqliteStorage, VisitCounter};
use adland::templates::TemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let geo = match config.filter.geoip_db_path.as_deref() {
        Some(path) => {
            info!("Loading GeoIP database: {}", path);
            GeoIpService::new(path)?
        }
        None => {
            info!("GEOIP_DB_PATH not set, area blocklists will never match");
            GeoIpService::disabled()
        }
    };

    let counter: Arc<dyn VisitCounter> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite visit counter: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL visit counter: {}", config.database.url);
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
    };
    counter
        .init()
        .await
        .context("failed to initialize visit counter store")?;

    info!("Loading route configuration from {}", config.filter.routes_file);
    let route_configs = load_routes(&config.filter.routes_file)?;
    let mut templates = TemplateStore::new(&config.filter.template_dir);
    let router = Router::build(&route_configs, &mut templates)?;
    info!("{} routes registered", router.len());

    let state = Arc::new(FilterState {
        router,
        counter,
        geo: Arc::new(geo),
        cookie_domain: config.filter.cookie_domain.clone(),
        client_ip: config.client_ip.clone(),
        static_dir: PathBuf::from(&config.filter.static_dir),
    });
    let app = create_filter_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        "🚀 Filter server listening on http://{}, cookie domain '{}'",
        addr, config.filter.cookie_domain
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}
