use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use lunchbox_controller_lib::config::{ControllerConfig, DEFAULT_CONFIG_FILE};
use lunchbox_controller_lib::core::bluetooth::{BluestTransport, DeviceController, channel};
use lunchbox_controller_lib::{LogDisplay, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = ControllerConfig::load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if logging::init(&config.log_level).is_err() {
        eprintln!("Logger already initialized");
    }
    info!("Starting Lunchbox controller for {:?}", config.device_address);

    let (handle, events, inbox) = channel(config.event_channel_capacity);
    let transport = BluestTransport::new(events, config.scan_timeout());
    let controller = DeviceController::new(config, transport, LogDisplay, inbox);
    let mut controller_task = tokio::spawn(controller.run());

    info!("Commands: toggle | connect | disconnect | status | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            result = &mut controller_task => {
                result.context("Controller task panicked")??;
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "toggle" => match handle.toggle_actuator().await {
                        Ok(state) => info!("Heater is now {}", state),
                        Err(e) => warn!("Toggle failed: {}", e),
                    },
                    "connect" => handle.request_connect().await?,
                    "disconnect" => handle.request_disconnect().await?,
                    "status" => {
                        let snapshot = handle.snapshot().await?;
                        info!("{}", serde_json::to_string_pretty(&snapshot)?);
                    }
                    "quit" | "exit" => break,
                    "" => {}
                    other => warn!("Unknown command: {}", other),
                }
            }
        }
    }

    handle.shutdown().await;
    match controller_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Controller stopped with error: {}", e),
        Err(e) => error!("Controller task failed: {}", e),
    }
    Ok(())
}
