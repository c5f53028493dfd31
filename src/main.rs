use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use http::{HeaderValue, Method, header};
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use owl::{app, config::Config, crypto::csrf::CSRF_HEADER, services::session::SessionManager, state::AppState};

/// How often expired sessions are collected in the background.
const SESSION_COLLECTION_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let injector = app::injector(&state);
    injector.show_available_builders();
    injector.run(|sessions: Arc<SessionManager>| {
        app::spawn_session_collector(sessions, SESSION_COLLECTION_INTERVAL);
    })?;

    let origin = format!("http://{}", config.bind_addr);
    let cors = CorsLayer::new()
        .allow_origin([origin.parse::<HeaderValue>().context("Invalid CORS origin")?])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE, CSRF_HEADER])
        .allow_credentials(true)
        .expose_headers([CSRF_HEADER])
        .max_age(Duration::from_secs(86400));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(50)
            .use_headers()
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let app = app::router(&state)?
        .layer(tower_governor::GovernorLayer::new(governor_conf))
        .layer(cors);

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
