use std::sync::Arc;

use populace::ai::{AiController, spawn_tick_driver};
use populace::config::get_config;
use populace::services::Services;
use populace::spawn::spawn_population;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = get_config();

    let services = match Services::from_config(config) {
        Ok(services) => services,
        Err(err) => {
            tracing::error!("Failed to start the world: {err}");
            return;
        }
    };

    spawn_population(&services);

    let controller = Arc::new(AiController::standard(&services));
    let driver = spawn_tick_driver(services.clone(), controller);

    tracing::info!(
        "World is running, ticking every {:?}",
        services.config.world.tick_interval()
    );

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {err}");
    }

    tracing::info!("Shutting down");

    driver.abort();
    services.respawns.cancel_all();
}
