use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use metadata_api::metrics::{ChannelSink, ReportSink, RequestMetrics, TracingSink};
use metadata_api::{create_router, AppState, Args, MetricsConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // ── 1. Logging ───────────────────────────────────────────────
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    // ── 2. Metrics collector ─────────────────────────────────────
    let config = MetricsConfig::from(&args);
    config.validate()?;

    let inner: Arc<dyn ReportSink> = Arc::new(TracingSink);
    let (sink, sink_worker) = ChannelSink::spawn(inner, config.report_queue);
    let metrics = Arc::new(RequestMetrics::new(config.clone(), sink.clone())?);

    info!(
        window = metrics.collector().capacity(),
        log_interval = config.log_interval,
        read_budget_ms = config.read_budget_ms,
        write_budget_ms = config.write_budget_ms,
        memory_budget_mb = config.memory_budget_mb,
        buckets_ms = ?config.histogram_buckets_ms,
        "Request metrics enabled"
    );

    // ── 3. Build shared state & router ───────────────────────────
    let state = Arc::new(AppState::new(metrics.clone()));
    let app = create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Metadata API ready");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // ── 5. Final flush ───────────────────────────────────────────
    metrics.shutdown();
    sink.close();
    if let Err(e) = sink_worker.await {
        warn!(error = %e, "Report sink task failed");
    }
    if sink.dropped() > 0 {
        warn!(dropped = sink.dropped(), "Histogram reports dropped under load");
    }

    info!("Metadata API stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "Shutting down API server"),
        _ = terminate => info!(signal = "SIGTERM", "Shutting down API server"),
    }
}
