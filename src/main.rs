use tracing::info;
use tracing_subscriber::EnvFilter;

use pawslot::App;
use pawslot::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    pawslot::observability::init(config.metrics_port)?;

    let app = App::start(config).await?;
    let config = app.config();
    info!("pawslot store ready");
    info!("  wal: {}", config.wal_path().display());
    info!("  groomers: {}", app.store().groomer_count());
    info!("  reservations: {}", app.store().reservation_count());
    info!("  admins: {:?}", config.admin_ids);
    info!("  overrun slots: {:?}", config.overrun_policy);
    info!(
        "  compaction: every {:?} past {} appends",
        config.compact_interval, config.compact_threshold
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    shutdown_signal().await?;
    info!("shutdown signal received");
    app.shutdown().await?;
    info!("pawslot stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
