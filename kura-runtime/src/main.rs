mod http;
mod telemetry;

use std::sync::Arc;

use kura_core::config::Config;
use kura_dataservice::{Orchestrator, OrchestratorContext};
use kura_persistence::sql::SqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let config = Config::new()?;

    telemetry::setup(&config)?;

    if let Some(prometheus) = config.telemetry.prometheus.clone() {
        tokio::task::spawn(async move {
            if let Err(e) = http::start_server(prometheus).await {
                tracing::error!("metrics server stopped, {}", e);
            }
        });
    }

    let backend = Arc::new(SqlBackend::new(&config.persistence));
    let orchestrator = Orchestrator::with_defaults(config.persistence.clone(), backend)
        .with_flusher(Arc::new(Box::new(telemetry::TelemetryFlusher)));
    let mut ctx = OrchestratorContext::new();

    orchestrator.connect(&mut ctx).await;

    let migrated = kura_persistence::apply_migrations(ctx.connection()?).await;
    if let Err(e) = migrated {
        tracing::error!("failed to apply migrations, {}", e);
        orchestrator.panic_shutdown(&mut ctx).await;
    }

    tracing::info!("data service ready, waiting for shutdown signal");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal, {}", e);
    }

    tracing::info!("shutting down");
    orchestrator.stop_data_service(&mut ctx).await;

    Ok(())
}
