use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movie_catalog_backend::{
    api,
    config::AppConfig,
    database::Database,
    lifecycle::{self, LifecycleError, ShutdownCoordinator},
    services::SearchHistoryRetention,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_catalog_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        environment = %config.environment,
        "Loaded configuration"
    );

    // Initialize database
    let database = Database::connect(&config.database).await?;

    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_grace_period));
    let shutdown = coordinator.shutdown_token();

    // Start search history retention task
    let retention = SearchHistoryRetention::new(
        Arc::new(database.repository().clone()),
        config.search_history_retention,
    );
    coordinator
        .tasks()
        .spawn("search_history_retention", retention.run(shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = api::AppState::new(database.clone(), coordinator.tasks().clone(), config);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🚀 Server listening on {}", addr);

    lifecycle::spawn_signal_listener(coordinator.clone());

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    };

    let outcome = coordinator.run(server).await;
    database.close().await;

    match outcome {
        Ok(report) => {
            tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "Stopped server");
            Ok(())
        }
        Err(e @ LifecycleError::ShutdownTimeout { .. }) => {
            tracing::error!(error = %e, "Shutdown did not complete within the grace period");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
