pub mod controller_config;

pub use controller_config::{ControllerConfig, DEFAULT_CONFIG_FILE};
