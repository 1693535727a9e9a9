//! Controller commands implementation
//! Actuator payloads, the controller mailbox messages and the clonable
//! [`ControllerHandle`] used to drive the controller.

use log::{debug, info};
use tokio::sync::{mpsc, oneshot, watch};

use crate::core::bluetooth::constants::{ACTUATOR_OFF_VALUE, ACTUATOR_ON_VALUE};
use crate::core::bluetooth::manager::ControllerSnapshot;
use crate::core::bluetooth::transport::{TransportEvent, TransportEventSender};
use crate::core::bluetooth::types::{ActuatorState, ConnectionState, Role};
use crate::error::ControllerError;

/// Heater commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Turn the heater on (0x11)
    Activate,
    /// Turn the heater off (0x00)
    Deactivate,
}

impl ActuatorCommand {
    /// The command that moves the actuator out of `current`.
    pub fn toggling(current: ActuatorState) -> Self {
        match current {
            ActuatorState::Active => Self::Deactivate,
            ActuatorState::Inactive => Self::Activate,
        }
    }

    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Activate => vec![ACTUATOR_ON_VALUE],
            Self::Deactivate => vec![ACTUATOR_OFF_VALUE],
        }
    }
}

/// User-initiated requests.
#[derive(Debug)]
pub enum ControllerRequest {
    Connect,
    Disconnect,
    ToggleActuator(oneshot::Sender<Result<ActuatorState, ControllerError>>),
    Snapshot(oneshot::Sender<ControllerSnapshot>),
    Shutdown,
}

/// Everything the controller mailbox carries, in arrival order.
#[derive(Debug)]
pub enum ControllerMessage {
    Transport(TransportEvent),
    Request(ControllerRequest),
    /// A polling job's period elapsed.
    PollTick { session: u64, role: Role },
}

/// Receiving half of the controller channel, consumed by
/// [`DeviceController::new`](crate::core::bluetooth::DeviceController::new).
pub struct ControllerInbox {
    pub(crate) rx: mpsc::Receiver<ControllerMessage>,
    pub(crate) mailbox: mpsc::WeakSender<ControllerMessage>,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
}

/// Creates the controller mailbox.
///
/// Returns the user-facing handle, the sender the transport posts its events
/// with, and the inbox the controller is built from.
pub fn channel(capacity: usize) -> (ControllerHandle, TransportEventSender, ControllerInbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let inbox = ControllerInbox {
        rx,
        mailbox: tx.downgrade(),
        state_tx,
    };
    let handle = ControllerHandle {
        tx: tx.clone(),
        state_rx,
    };
    (handle, TransportEventSender::new(tx.downgrade()), inbox)
}

/// A clonable handle that sends requests to the controller task.
///
/// Dropping the last handle stops the controller the same way
/// [`shutdown`](Self::shutdown) does.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerMessage>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ControllerHandle {
    async fn send(&self, request: ControllerRequest) -> Result<(), ControllerError> {
        self.tx
            .send(ControllerMessage::Request(request))
            .await
            .map_err(|_| ControllerError::Closed)
    }

    /// Asks the transport to connect to the configured device.
    pub async fn request_connect(&self) -> Result<(), ControllerError> {
        self.send(ControllerRequest::Connect).await
    }

    /// Asks the transport to drop the link.
    pub async fn request_disconnect(&self) -> Result<(), ControllerError> {
        self.send(ControllerRequest::Disconnect).await
    }

    /// Writes the opposite actuator state and returns the new state once the
    /// write is confirmed.
    pub async fn toggle_actuator(&self) -> Result<ActuatorState, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ControllerRequest::ToggleActuator(reply_tx)).await?;
        reply_rx.await.map_err(|_| ControllerError::Closed)?
    }

    /// Current controller state, taken after every earlier message has been
    /// processed.
    pub async fn snapshot(&self) -> Result<ControllerSnapshot, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(ControllerRequest::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| ControllerError::Closed)
    }

    /// Stops the controller and cancels its polling jobs.
    pub async fn shutdown(&self) {
        if self.send(ControllerRequest::Shutdown).await.is_err() {
            debug!("Controller already stopped");
        } else {
            info!("Shutdown requested");
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every connection state change.
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}
