// Benefits Console - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use benefits_console::api::{router, AppState};
use benefits_console::{Settings, SqliteStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = SqliteStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open database {}", settings.db_path.display()))?;
    let rules = settings.load_rules()?;
    tracing::info!(
        db = %settings.db_path.display(),
        rules = rules.rule_count(),
        "database ready"
    );

    let app = router(AppState::new(store, rules))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = settings.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "benefits-server listening");
    axum::serve(listener, app).await.context("server stopped")?;

    Ok(())
}
