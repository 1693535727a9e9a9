//! Transport boundary
//! The connection/transport service owns the physical link. The controller
//! consumes it through [`GattTransport`] and receives its lifecycle and data
//! events as [`TransportEvent`]s on the controller mailbox.

use std::fmt::Write as _;

use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::bluetooth::commands::ControllerMessage;
use crate::core::bluetooth::types::{AttributeTree, GattCharacteristic};
use crate::error::TransportError;

/// Events emitted by the transport, delivered in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    ServicesDiscovered,
    /// A read completed or a notification arrived.
    DataAvailable { uuid: Uuid, payload: Option<String> },
}

/// Operations the controller issues against the transport.
///
/// Reads and notification toggles are fire-and-forget: their results come
/// back later as [`TransportEvent::DataAvailable`]. Writes report success
/// through their return value.
#[async_trait]
pub trait GattTransport: Send {
    async fn initialize(&mut self) -> Result<(), TransportError>;

    async fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn read_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
    ) -> Result<(), TransportError>;

    async fn write_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
        value: &[u8],
    ) -> Result<(), TransportError>;

    async fn set_characteristic_notification(
        &mut self,
        characteristic: &GattCharacteristic,
        enabled: bool,
    ) -> Result<(), TransportError>;

    async fn supported_attribute_tree(&mut self) -> Result<AttributeTree, TransportError>;
}

/// Clonable sender a transport uses to post events to the controller.
///
/// Holds only a weak reference to the mailbox. The controller stops once
/// every [`ControllerHandle`](crate::core::bluetooth::ControllerHandle) is
/// dropped, even while its transport still holds one of these.
#[derive(Clone)]
pub struct TransportEventSender {
    tx: mpsc::WeakSender<ControllerMessage>,
}

impl TransportEventSender {
    pub(crate) fn new(tx: mpsc::WeakSender<ControllerMessage>) -> Self {
        Self { tx }
    }

    /// Posts an event. Returns `false` once the controller has stopped.
    pub async fn send(&self, event: TransportEvent) -> bool {
        let Some(tx) = self.tx.upgrade() else {
            debug!("Controller gone, dropping transport event: {:?}", event);
            return false;
        };
        match tx.send(ControllerMessage::Transport(event)).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Controller gone, dropping transport event: {:?}", e.0);
                false
            }
        }
    }

    /// Posts `events` from a background task, in order.
    ///
    /// For transport calls made by the controller itself, which must not
    /// wait on the controller's own mailbox.
    pub fn post(&self, events: Vec<TransportEvent>) -> JoinHandle<()> {
        let sender = self.clone();
        tokio::spawn(async move {
            for event in events {
                if !sender.send(event).await {
                    break;
                }
            }
        })
    }
}

/// Renders a characteristic value the way the transport reports it: the
/// bytes as text, a line break, then the bytes in hex.
pub fn render_payload(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let mut rendered = String::from_utf8_lossy(data).into_owned();
    rendered.push('\n');
    for byte in data {
        let _ = write!(rendered, "{:02X} ", byte);
    }
    Some(rendered)
}
