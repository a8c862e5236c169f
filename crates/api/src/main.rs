//! API server entry point.

use std::sync::Arc;

use domain::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresOrderStore::connect(&url)
                .await
                .expect("failed to connect to Postgres");
            tracing::info!("using PostgreSQL order store");
            serve(Arc::new(store), config, metrics_handle).await;
        }
        None => {
            let store = Arc::new(InMemoryOrderStore::new());
            api::seed_demo_catalog(store.as_ref())
                .await
                .expect("failed to seed demo catalog");
            tracing::info!("using in-memory order store");
            serve(store, config, metrics_handle).await;
        }
    }
}

async fn serve<S: OrderStore + 'static>(
    orders: Arc<S>,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let providers = api::http_providers(&config);
    let state = api::create_state(orders, providers, &config);
    let app = api::create_app(Arc::clone(&state), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    let coordinator = Arc::clone(&state.coordinator);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Stop pollers and dispatchers between their waits.
            coordinator.shutdown();
        })
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
