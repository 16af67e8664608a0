use std::sync::Arc;

use shopledger_api::app::{build_app, services::AppServices};
use shopledger_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopledger_observability::init();

    let config = LedgerConfig::from_env()?;
    let services = Arc::new(AppServices::from_config(&config)?);

    if let Some(report) = services.reconcile_on_startup(config.reconcile_on_startup).await? {
        tracing::info!(
            mode = ?report.mode,
            scanned = report.scanned,
            drifts = report.drifts.len(),
            "startup reconciliation finished"
        );
    }

    let app = build_app(services);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
