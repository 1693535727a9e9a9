//! Notification target arbitration
//! At most one characteristic holds a notification subscription. Switching
//! targets always disables the old one before enabling the new one.

use log::{debug, info, warn};

use crate::core::bluetooth::transport::GattTransport;
use crate::core::bluetooth::types::GattCharacteristic;
use crate::error::TransportError;

/// Tracks the single characteristic subscribed for notifications.
#[derive(Debug, Default)]
pub struct NotificationArbiter {
    target: Option<GattCharacteristic>,
}

impl NotificationArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&GattCharacteristic> {
        self.target.as_ref()
    }

    /// Makes `new` the notification target, or clears the target when `None`.
    ///
    /// Disabling the previous target is best effort: a failure is logged and
    /// the local target is cleared regardless. A failure to enable `new`
    /// leaves no target stored and is returned to the caller.
    pub async fn set_target<T>(
        &mut self,
        transport: &mut T,
        new: Option<&GattCharacteristic>,
    ) -> Result<(), TransportError>
    where
        T: GattTransport + ?Sized,
    {
        if let Some(current) = self.target.take() {
            if new.is_some_and(|n| n.uuid == current.uuid) {
                debug!("Notification target {} unchanged", current.uuid);
                self.target = Some(current);
                return Ok(());
            }
            if let Err(e) = transport.set_characteristic_notification(&current, false).await {
                warn!("Failed to disable notifications on {}: {}", current.uuid, e);
            } else {
                debug!("Notifications disabled on {}", current.uuid);
            }
        }

        if let Some(new) = new {
            transport.set_characteristic_notification(new, true).await?;
            info!("Notification target set to {}", new.uuid);
            self.target = Some(new.clone());
        }
        Ok(())
    }

    /// Forgets the target without touching the transport, for when the link
    /// is already gone.
    pub fn forget(&mut self) {
        self.target = None;
    }
}
