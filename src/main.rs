use std::time::Duration;

use tracing_subscriber::EnvFilter;
use upload_server::app_state::AppState;
use upload_server::config::Config;
use upload_server::{api, coordinator::UploadCoordinator};

/// Config has to be loaded before the runtime is built, since `io_pool_size` sizes the
/// runtime's blocking pool (where `finalize`'s `spawn_blocking` assembly work runs,
/// §4.4) — so this builds the runtime by hand instead of using `#[tokio::main]`.
fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.server.io_pool_size)
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config.logging.level);

    let state = AppState::new(config.clone());

    if config.storage.auto_cleanup_enabled {
        spawn_cleanup_task(
            state.coordinator.clone(),
            CLEANUP_SWEEP_INTERVAL,
            config.storage.auto_cleanup_delay(),
        );
    }

    let router = api::router(state);
    let address = config.server_address();
    tracing::info!(address = %address, "upload receiver listening");

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

/// Sweeps run on a fixed hourly cadence regardless of `max_age` (§10.5): the delay
/// only governs how stale a terminal session must be before it's removed.
const CLEANUP_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Background sweep (§10.5): every `sweep_interval`, removes terminal sessions older
/// than `max_age` from the registry and their orphaned chunk directories.
fn spawn_cleanup_task(coordinator: UploadCoordinator, sweep_interval: Duration, max_age: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::hours(24));
        loop {
            interval.tick().await;
            coordinator.run_cleanup_sweep(max_age).await;
        }
    });
}
