use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use topowatch::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let api = Arc::new(
        api_repo::ApiRepo::new(&app_config.api)
            .map_err(|e| anyhow::anyhow!("api client: {}", e))?,
    );
    let store = Arc::new(store::ViewModelStore::new(
        app_config.sparkline.capacity,
        app_config.publishing.broadcast_capacity,
    ));
    tracing::info!(upstream = api.base_url(), "Polling upstream API");

    let cancel = CancellationToken::new();
    let poller_handle = poller::spawn(
        poller::PollerDeps {
            api: api.clone(),
            store: store.clone(),
            cancel: cancel.clone(),
        },
        poller::PollerConfig::from(&app_config),
    );

    let app = routes::app(store, api, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        signal_cancel.cancel();
    });

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    cancel.cancel();
    let _ = poller_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
