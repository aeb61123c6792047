use tokio_util::sync::CancellationToken;
use tracing::info;

use ticketsim::config::SimConfig;
use ticketsim::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("TICKETSIM_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    ticketsim::observability::init(metrics_port)?;

    let report_json = std::env::var("TICKETSIM_REPORT_JSON").is_ok_and(|v| v == "1" || v == "true");
    let config = SimConfig::from_env()?;
    info!("ticketsim starting");
    info!("  events: {} x {} seats", config.event_count, config.capacity);
    info!("  workers: {} (admission limit {})", config.worker_count, config.admission_limit);
    info!("  run limit: {:?}", config.run_limit);
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Ctrl-C/SIGTERM end the run through the same cooperative path as the run limit.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let report = Supervisor::new(config).run(shutdown).await?;
    println!("{report}");
    if report_json {
        println!("{}", report.to_json()?);
    }

    info!("ticketsim stopped");
    Ok(())
}
