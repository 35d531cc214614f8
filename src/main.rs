pub mod barista;
pub mod brewing_scheduler;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event_log;
pub mod order;
pub mod order_engine;
pub mod order_store;
pub mod protocol;
pub mod ready_notifier;
pub mod session;

use std::sync::Arc;

use log::{info, warn};
use simple_logger::SimpleLogger;

use barista::Barista;
use config::CafeConfig;
use errors::CafeError;
use event_log::JsonEventLog;

#[tokio::main]
async fn main() -> Result<(), CafeError> {
    let config = CafeConfig::from_env();
    SimpleLogger::new().with_level(config.log_level).init()?;

    let events = Arc::new(JsonEventLog::open(&config.event_log_file)?);
    let barista = Arc::new(Barista::new(config, events)?);
    let listener = barista.bind().await?;

    let shutdown = barista.shutdown_token().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("[BARISTA] Received Ctrl-C, closing the cafe");
                shutdown.cancel();
            }
            Err(e) => warn!("[BARISTA] Could not listen for Ctrl-C: {}", e),
        }
    });

    barista.serve(listener).await
}
