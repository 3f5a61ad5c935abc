use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use identity_service::config::load_config;
use identity_service::metrics::IdentityMetrics;
use identity_service::service::AuthService;
use identity_service::store::PgCredentialStore;
use identity_service::tokens::TokenSigner;
use identity_service::{build_router, AppState};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common_observability::init_tracing("info");

    let config = load_config()?;
    info!(?config, "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to apply migrations")?;
    let store = PgCredentialStore::new(pool);
    store
        .sync_catalog()
        .await
        .context("failed to synchronise role catalog")?;

    let signer = Arc::new(TokenSigner::new(config.token_config())?);
    let auth = AuthService::new(Arc::new(store), signer)?;
    let metrics = Arc::new(IdentityMetrics::new()?);
    let state = AppState::new(auth, metrics);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = build_router(state).layer(cors);

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST '{}'", config.host))?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting identity-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
