//! Greenhouse Agent - closed-loop environmental control daemon

use control_engine::{
    ActuationPublisher, ControlService, DecisionEngine, ProcessPredictor, SensorSynchronizer,
};
use greenhouse_core::feeds::SENSOR_FEEDS;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adafruit;
mod config;
mod store;

use adafruit::AdafruitClient;
use config::AgentConfig;
use store::{FileNotifier, JsonStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenhouse_agent=info,control_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = AgentConfig::default_path();
    let config = AgentConfig::load(&config_path)?;
    tracing::info!("Loaded config from {:?}", config_path);

    let platform = Arc::new(AdafruitClient::new(
        config.platform_base_url.clone(),
        config.platform_username.clone(),
        config.platform_key.clone(),
    )?);
    if !platform.connect().await {
        tracing::warn!("Telemetry platform unreachable at startup, will retry on use");
    }

    let store = Arc::new(JsonStore::new(&config.data_dir));
    store.ensure_settings().await?;

    let synchronizer = Arc::new(SensorSynchronizer::new(
        platform.clone(),
        store.clone(),
        SENSOR_FEEDS.iter().map(ToString::to_string).collect(),
    ));

    let predictor = Arc::new(ProcessPredictor::new(
        &config.interpreter,
        &config.model_root,
        Duration::from_secs(config.prediction_timeout_secs),
    ));
    let publisher = ActuationPublisher::new(platform.clone(), platform.topic_prefix());
    let notifier = Arc::new(FileNotifier::new(&config.data_dir));

    let engine = Arc::new(DecisionEngine::new(
        store.clone(),
        store.clone(),
        predictor,
        publisher,
        Some(notifier),
    ));

    let service = ControlService::new(
        synchronizer,
        engine,
        Duration::from_secs(config.sync_interval_secs),
        Duration::from_secs(config.control_interval_secs),
    );
    service.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.stop();
    Ok(())
}
