use anyhow::{Context, Result};
use peer_player::{
    config::{self, DEFAULT_CONFIG_PATH},
    event::{self, Event, EventBus},
    host::{self, Handlers, Host},
    stdin,
};
use std::sync::Arc;

#[macro_use]
extern crate log;

fn init_logger(level: &str) -> Result<()> {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.try_init().context("Failed to initialize logger")
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load(&path).await?;

    init_logger(&config.log_level)?;
    info!("Loaded configuration from {path}");

    let bus = EventBus::new();
    event::debug(&bus);

    let host = Host::new(Handlers::console(), Arc::new(config));
    let mut host_task = host::start(host, &bus);

    stdin::start(bus.clone());

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            true
        }
        result = &mut host_task => {
            result?;
            false
        }
    };

    if interrupted {
        info!("Interrupted, shutting down");
        bus.send(Event::Shutdown);
        host_task.await?;
    }

    Ok(())
}
