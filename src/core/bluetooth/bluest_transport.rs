//! Bluetooth transport backed by bluest
//! Finds the configured device, connects, discovers its attribute tree and
//! turns reads, notifications and link loss into [`TransportEvent`]s.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::transport::{
    GattTransport, TransportEvent, TransportEventSender, render_payload,
};
use crate::core::bluetooth::types::{
    AttributeTree, CharacteristicProperties, GattCharacteristic, GattService,
};
use crate::error::TransportError;

/// Production transport over the system Bluetooth adapter.
pub struct BluestTransport {
    events: TransportEventSender,
    scan_timeout: Duration,
    adapter: Option<Adapter>,
    device: Option<Device>,
    tree: AttributeTree,
    characteristics: HashMap<Uuid, Characteristic>,
    notifications: HashMap<Uuid, CancellationToken>,
    link_watcher: Option<CancellationToken>,
}

impl BluestTransport {
    pub fn new(events: TransportEventSender, scan_timeout: Duration) -> Self {
        Self {
            events,
            scan_timeout,
            adapter: None,
            device: None,
            tree: Vec::new(),
            characteristics: HashMap::new(),
            notifications: HashMap::new(),
            link_watcher: None,
        }
    }

    fn adapter(&self) -> Result<Adapter, TransportError> {
        self.adapter.clone().ok_or(TransportError::NotInitialized)
    }

    fn characteristic(&self, uuid: &Uuid) -> Result<Characteristic, TransportError> {
        self.characteristics
            .get(uuid)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(*uuid))
    }

    /// Looks for the device among connected devices first, then scans.
    async fn find_device(&self, adapter: &Adapter, address: &str) -> Result<Device, TransportError> {
        for device in adapter.connected_devices().await? {
            if matches_address(&device, address) {
                info!("Device {} is already connected to the system", address);
                return Ok(device);
            }
        }

        info!("Scanning for {} ({} s)...", address, self.scan_timeout.as_secs());
        let scan = async {
            let mut scan_stream = adapter.scan(&[]).await?;
            while let Some(discovered) = scan_stream.next().await {
                debug!("Found device - Device: {:?}, RSSI: {:?}", discovered.device, discovered.rssi);
                if matches_address(&discovered.device, address) {
                    return Ok(Some(discovered.device));
                }
            }
            Ok::<_, TransportError>(None)
        };

        match tokio::time::timeout(self.scan_timeout, scan).await {
            Ok(Ok(Some(device))) => Ok(device),
            Ok(Ok(None)) | Err(_) => Err(TransportError::DeviceNotFound(address.to_string())),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Reads the full attribute tree and remembers every characteristic
    /// handle for later reads and writes.
    async fn discover(&mut self, device: &Device) -> Result<(), TransportError> {
        let mut tree = Vec::new();
        let mut characteristics = HashMap::new();

        for service in device.services().await? {
            let mut gatt_characteristics = Vec::new();
            for characteristic in service.characteristics().await? {
                let props = characteristic.properties().await?;
                let properties = CharacteristicProperties {
                    read: props.read,
                    write: props.write || props.write_without_response,
                    notify: props.notify || props.indicate,
                };
                let uuid = characteristic.uuid();
                gatt_characteristics.push(GattCharacteristic::new(uuid, properties));
                characteristics.entry(uuid).or_insert(characteristic);
            }
            debug!("Service {} with {} characteristic(s)", service.uuid(), gatt_characteristics.len());
            tree.push(GattService::new(service.uuid(), gatt_characteristics));
        }

        self.tree = tree;
        self.characteristics = characteristics;
        Ok(())
    }

    fn watch_link(&mut self, adapter: Adapter, device: Device) {
        if let Some(previous) = self.link_watcher.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        let task_token = token.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut connection_events = match adapter.device_connection_events(&device).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to watch connection events: {}", e);
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = connection_events.next() => match event {
                        Some(ConnectionEvent::Disconnected) => {
                            info!("Device {} lost connection", device.id());
                            events.send(TransportEvent::Disconnected).await;
                            break;
                        }
                        Some(ConnectionEvent::Connected) => {}
                        None => break,
                    }
                }
            }
        });

        self.link_watcher = Some(token);
    }

    fn drop_session(&mut self) {
        for (_, token) in self.notifications.drain() {
            token.cancel();
        }
        if let Some(watcher) = self.link_watcher.take() {
            watcher.cancel();
        }
        self.tree.clear();
        self.characteristics.clear();
        self.device = None;
    }
}

#[async_trait]
impl GattTransport for BluestTransport {
    async fn initialize(&mut self) -> Result<(), TransportError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| TransportError::Backend("No Bluetooth adapter found".into()))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");
        self.adapter = Some(adapter);
        Ok(())
    }

    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let adapter = self.adapter()?;
        let device = self.find_device(&adapter, address).await?;

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            adapter.connect_device(&device).await?;
        }
        info!("Connection successful, discovering services...");

        self.watch_link(adapter.clone(), device.clone());
        self.device = Some(device.clone());

        if let Err(e) = self.discover(&device).await {
            error!("Service discovery failed on {}: {}", device.id(), e);
            self.drop_session();
            if let Err(disconnect_error) = adapter.disconnect_device(&device).await {
                warn!("Failed to drop link after discovery failure: {}", disconnect_error);
            }
            return Err(e);
        }

        self.events
            .post(vec![TransportEvent::Connected, TransportEvent::ServicesDiscovered]);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let adapter = self.adapter()?;
        let Some(device) = self.device.clone() else {
            info!("No device connected");
            return Ok(());
        };

        self.drop_session();
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            adapter.disconnect_device(&device).await?;
            info!("Successfully disconnected");
        }

        self.events.post(vec![TransportEvent::Disconnected]);
        Ok(())
    }

    async fn read_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
    ) -> Result<(), TransportError> {
        let handle = self.characteristic(&characteristic.uuid)?;
        let uuid = characteristic.uuid;
        let events = self.events.clone();

        tokio::spawn(async move {
            match handle.read().await {
                Ok(value) => {
                    events
                        .send(TransportEvent::DataAvailable {
                            uuid,
                            payload: render_payload(&value),
                        })
                        .await;
                }
                Err(e) => warn!("Read of {} failed: {}", uuid, e),
            }
        });
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let handle = self.characteristic(&characteristic.uuid)?;
        info!("Writing {:02X?} to {}", value, characteristic.uuid);
        handle.write(value).await?;
        Ok(())
    }

    async fn set_characteristic_notification(
        &mut self,
        characteristic: &GattCharacteristic,
        enabled: bool,
    ) -> Result<(), TransportError> {
        let uuid = characteristic.uuid;

        if !enabled {
            if let Some(token) = self.notifications.remove(&uuid) {
                token.cancel();
                debug!("Unsubscribed from {}", uuid);
            }
            return Ok(());
        }

        if self.notifications.contains_key(&uuid) {
            return Ok(());
        }

        let handle = self.characteristic(&uuid)?;
        let token = CancellationToken::new();
        let task_token = token.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut notification_stream = match handle.notify().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to subscribe to notifications on {}: {}", uuid, e);
                    return;
                }
            };
            debug!("Listening for notifications on {}", uuid);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    item = notification_stream.next() => match item {
                        Some(Ok(value)) => {
                            events
                                .send(TransportEvent::DataAvailable {
                                    uuid,
                                    payload: render_payload(&value),
                                })
                                .await;
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
            debug!("Notification stream for {} ended", uuid);
        });

        self.notifications.insert(uuid, token);
        Ok(())
    }

    async fn supported_attribute_tree(&mut self) -> Result<AttributeTree, TransportError> {
        if self.device.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(self.tree.clone())
    }
}

/// True when `address` names `device` by platform id, MAC address or name.
fn matches_address(device: &Device, address: &str) -> bool {
    let id = device.id().to_string();
    if id.eq_ignore_ascii_case(address) {
        return true;
    }
    if extract_mac_address(&id).is_some_and(|mac| mac.eq_ignore_ascii_case(address)) {
        return true;
    }
    device.name().is_ok_and(|name| name == address)
}

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().replace('-', ":").to_uppercase())
}
