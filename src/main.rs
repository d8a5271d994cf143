use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use isponsor::config::AppConfig;
use isponsor::db::{self, slot::FileSlot, DomainStore};
use isponsor::identity::{HttpIdentityProvider, IdentityProvider};
use isponsor::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "isponsor=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting iSponsor...");

    let config = AppConfig::from_env()?;

    let store = if config.persist {
        let slot = FileSlot::new(&config.data_dir);
        tracing::info!("Persisting store state to {}", slot.path().display());
        DomainStore::open(Box::new(slot))
    } else {
        tracing::info!("Persistence disabled, running on seed data");
        DomainStore::seeded()
    };

    let identity: Option<Arc<dyn IdentityProvider>> = match &config.identity {
        Some(cfg) => {
            tracing::info!("Identity provider at {}", cfg.base_url);
            Some(Arc::new(HttpIdentityProvider::new(cfg.clone())))
        }
        None => {
            tracing::warn!("IDENTITY_PROVIDER_URL not set; sign-up and password reset are unavailable");
            None
        }
    };

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let cors = {
        let origins = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();

        let origins = if origins.is_empty() {
            if config.is_production() {
                anyhow::bail!("ALLOWED_ORIGINS must contain at least one valid origin in production");
            }
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        } else {
            origins
        };

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    };

    let addr = config.bind_addr;
    let state = AppState {
        store: db::shared(store),
        config: Arc::new(config),
        identity,
    };

    let app = isponsor::router(state)
        .layer(cors)
        .layer(GovernorLayer::new(governor_config));

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
