use clap::Parser;
use hydra::cli::Cli;
use hydra::config::Settings;
use hydra::gateway::{GatewayClient, LoopbackGateway};
use hydra::persistence::{ConnectionPool, SqlAgentRepository};
use hydra::pool::{PoolContext, PoolOptions, PoolReconciler};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;

    info!(
        database = %settings.database.url,
        driver = %settings.gateway.driver,
        "starting hydra agent pool"
    );

    // Connect to the desired-state database
    let pool = ConnectionPool::new(&settings.database.url, settings.database.max_connections).await?;
    pool.health_check().await?;
    info!(backend = pool.backend().name(), "database connection verified");
    let repository = SqlAgentRepository::new(pool.clone());
    repository.init_schema().await?;

    let gateway: Arc<dyn GatewayClient> = match settings.gateway.driver.as_str() {
        "loopback" => Arc::new(LoopbackGateway),
        other => anyhow::bail!("unknown gateway driver '{other}'"),
    };

    let ctx = Arc::new(PoolContext::from_settings(&settings, gateway));
    let options = PoolOptions::from_settings(&settings);
    let reconciler = PoolReconciler::new(Arc::new(repository), ctx, options);

    // Ctrl-C starts a graceful drain of every connection
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // SIGHUP triggers an immediate reconciliation pass
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        use tracing::warn;
        let refresh = reconciler.refresh_handle();
        match signal(SignalKind::hangup()) {
            Ok(mut hangup) => {
                tokio::spawn(async move {
                    while hangup.recv().await.is_some() {
                        info!("SIGHUP received, refreshing desired state");
                        refresh.notify_one();
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to install SIGHUP handler"),
        }
    }

    reconciler.run(shutdown_rx).await;

    pool.close().await;
    info!("hydra stopped");
    Ok(())
}
