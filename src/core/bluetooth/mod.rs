//! Bluetooth functionality for the Lunchbox controller
//! This module owns the connection lifecycle, notification arbitration and
//! sensor polling, plus the transport boundary and its bluest backend.

mod bluest_transport;
mod commands;
pub mod constants;
mod manager;
mod notification;
mod scheduler;
mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use bluest_transport::BluestTransport;
pub use commands::{
    ActuatorCommand, ControllerHandle, ControllerInbox, ControllerMessage, ControllerRequest,
    channel,
};
pub use manager::{ControllerSnapshot, DeviceController};
pub use notification::NotificationArbiter;
pub use scheduler::{PollPeriods, PollingScheduler, poll_cycle};
pub use transport::{GattTransport, TransportEvent, TransportEventSender, render_payload};
pub use types::{
    ActuatorState, AttributeTree, CharacteristicProperties, ConnectionState, GattCharacteristic,
    GattService, Role,
};
