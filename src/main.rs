use std::sync::Arc;

use anyhow::Result;
use home_battery_dispatch::{actuator, api, config, controller, providers, telemetry};
use tracing::{info, warn};

use config::Config;
use controller::{AppState, DispatchController};
use telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::load()?;

    let sensors: Arc<dyn providers::SensorBus> = sensor_bus();
    let prices: Arc<dyn providers::PriceProvider> = price_provider(&cfg)?;
    let profile: Arc<dyn providers::ConsumptionProfileSource> = match &cfg.planner.profile_path {
        Some(path) => Arc::new(providers::JsonFileProfileSource::new(path.clone())),
        None => Arc::new(providers::DefaultProfileSource),
    };
    let target_store = Arc::new(providers::FileTargetSocStore::new(
        cfg.store.target_soc_path.clone(),
    ));
    let inverter = Arc::new(actuator::sim::SimulatedActuator::default());

    let dispatch = Arc::new(DispatchController::new(
        cfg.clone(),
        sensors,
        prices,
        profile,
        target_store,
        inverter,
    ));
    let app_state = AppState::new(cfg.clone(), dispatch.clone());

    let app = api::router(app_state, &cfg);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0 - the API will be reachable from the network");
    }
    info!(%addr, tick_seconds = cfg.controller.tick_seconds, "starting battery dispatch");

    controller::spawn_controller_tasks(dispatch);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}

#[cfg(feature = "sim")]
fn sensor_bus() -> Arc<dyn providers::SensorBus> {
    Arc::new(providers::SimulatedSensorBus::default())
}

#[cfg(not(feature = "sim"))]
fn sensor_bus() -> Arc<dyn providers::SensorBus> {
    // No automation platform wired in yet; ticks run the degraded
    // fallback until a real bus implementation lands here.
    Arc::new(providers::StaticSensorBus::default())
}

#[cfg(feature = "sim")]
fn price_provider(_cfg: &Config) -> Result<Arc<dyn providers::PriceProvider>> {
    use chrono::{Duration as ChronoDuration, Local};
    let today = Local::now().date_naive();
    Ok(Arc::new(providers::StaticPriceProvider {
        today: Some(providers::synthetic_curve(today)),
        tomorrow: Some(providers::synthetic_curve(today + ChronoDuration::days(1))),
    }))
}

#[cfg(not(feature = "sim"))]
fn price_provider(cfg: &Config) -> Result<Arc<dyn providers::PriceProvider>> {
    use std::time::Duration;
    Ok(Arc::new(providers::HttpPriceProvider::new(
        cfg.prices.base_url.clone(),
        Duration::from_secs(cfg.prices.http_timeout_seconds),
        Duration::from_secs(cfg.prices.cache_ttl_seconds),
    )?))
}
