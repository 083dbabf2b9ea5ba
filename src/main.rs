use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use log::info;
use outbox_dispatch::application::runner;
use outbox_dispatch::handlers::{AssetCreatedHandler, OutboxEventHandler};
use outbox_dispatch::metrics::LogMetrics;
use outbox_dispatch::{
    create_pool, run_migrations, AppError, DispatchConfig, HandlerRegistry, OutboxDispatcher,
    OutboxError, PgOutboxStore,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url =
        env::var("DATABASE_URL").map_err(|_| AppError::MissingEnv("DATABASE_URL"))?;
    let config = DispatchConfig::from_env()?;

    let pool = create_pool(&database_url).map_err(OutboxError::from)?;
    run_migrations(&pool)?;

    let registry =
        HandlerRegistry::new([Arc::new(AssetCreatedHandler) as Arc<dyn OutboxEventHandler>])?;
    info!(
        "Outbox handlers registered: {}",
        registry.event_types().join(", ")
    );

    let dispatcher = Arc::new(OutboxDispatcher::new(
        PgOutboxStore::new(pool),
        Arc::new(registry),
        Arc::new(LogMetrics),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(runner::run(dispatcher, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    // The runner also stops if the sender is gone.
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker.await {
        log::error!("Outbox dispatcher task failed: {}", e);
    }
    Ok(())
}
