use anyhow::Context;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::state::AppState;

pub async fn handle(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Starting Civic Case API in {:?} mode", config.environment);

    let db = if config.database.run_migrations {
        let db = DatabaseManager::connect(&config.database)
            .await
            .context("failed to connect to the database")?;
        db.migrate().await.context("failed to apply migrations")?;
        db
    } else {
        // Let the server come up and report 503 on /health until the database is reachable
        DatabaseManager::connect_lazy(&config.database).context("invalid database configuration")?
    };

    if crate::is_production!() && config.geocoding.api_key.is_empty() {
        tracing::warn!("GEOCODING_API_KEY is not set; /api/geocode/reverse will answer 503");
    }

    let state = AppState::new(db.clone(), config.clone()).context("failed to build geocoding client")?;
    let app = crate::app(state);

    let port = port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Civic Case API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
