//! Lunchbox controller library
//! A BLE central that keeps one session with the Lunchbox peripheral: it
//! classifies the discovered attributes, polls the temperature sensors,
//! turns readings into hot/cold display values and toggles the heater.

pub mod config;
pub mod core;
pub mod display;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::ControllerConfig;
pub use display::{DisplayEvent, DisplaySink, LogDisplay};
pub use error::{ConfigError, ControllerError, ReadingError, TransportError};
