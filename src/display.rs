//! Presentation sink
//! The controller pushes display updates out through [`DisplaySink`]; it
//! never reads anything back from the presentation layer.

use log::{debug, info};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::bluetooth::{ActuatorState, ConnectionState};

/// Updates emitted for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "kebab-case")]
pub enum DisplayEvent {
    ConnectionStateChanged(ConnectionState),
    ColdValue(String),
    HotValue(String),
    OverlayIntensity(u8),
    ActuatorStateChanged(ActuatorState),
    /// Derived readings were reset after a disconnect.
    ReadingsCleared,
}

/// Receives display updates from the controller.
pub trait DisplaySink: Send {
    fn emit(&mut self, event: DisplayEvent);
}

impl DisplaySink for mpsc::UnboundedSender<DisplayEvent> {
    fn emit(&mut self, event: DisplayEvent) {
        if let Err(e) = self.send(event) {
            debug!("Display receiver dropped, discarding {:?}", e.0);
        }
    }
}

/// Writes every display update to the log as JSON.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn emit(&mut self, event: DisplayEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!("display {}", json),
            Err(_) => info!("display {:?}", event),
        }
    }
}
