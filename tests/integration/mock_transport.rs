//! Mock transport for integration tests.
//!
//! Records every call the controller makes so tests can assert on the full
//! call history, and lets tests inject failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lunchbox_controller_lib::config::ControllerConfig;
use lunchbox_controller_lib::core::bluetooth::constants::{
    UUID_DEVICE_INFORMATION_SERVICE, UUID_DEVICE_NAME, UUID_DEVICE_ON_OFF, UUID_LUNCHBOX_SERVICE,
    UUID_TEMPERATURE_SENSOR_1, UUID_TEMPERATURE_SENSOR_2,
};
use lunchbox_controller_lib::core::bluetooth::{
    AttributeTree, CharacteristicProperties, ControllerHandle, ControllerSnapshot,
    DeviceController, GattCharacteristic, GattService, GattTransport, TransportEvent,
    TransportEventSender, channel,
};
use lunchbox_controller_lib::{ControllerError, DisplayEvent, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Initialize,
    Connect(String),
    Disconnect,
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    Notify(Uuid, bool),
    AttributeTree,
}

#[derive(Default)]
struct MockState {
    calls: Vec<TransportCall>,
    tree: AttributeTree,
    fail_init: bool,
    fail_write: bool,
    fail_notify: bool,
}

/// Shared view of the mock, kept by the test after the transport moves
/// into the controller.
#[derive(Clone, Default)]
pub struct MockLog {
    inner: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockLog {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    pub fn reads_of(&self, uuid: Uuid) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == TransportCall::Read(uuid))
            .count()
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.inner.lock().unwrap().fail_write = fail;
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.inner.lock().unwrap().fail_init = fail;
    }

    /// Makes every notification enable fail; disables still succeed.
    pub fn set_fail_notify(&self, fail: bool) {
        self.inner.lock().unwrap().fail_notify = fail;
    }
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    log: MockLog,
    /// When set, `connect` reports the link and its services the way the
    /// bluest transport does.
    events: Option<TransportEventSender>,
}

impl MockTransport {
    pub fn new(tree: AttributeTree) -> (Self, MockLog) {
        let log = MockLog::default();
        log.inner.lock().unwrap().tree = tree;
        (
            Self {
                log: log.clone(),
                events: None,
            },
            log,
        )
    }

    pub fn with_events(mut self, events: TransportEventSender) -> Self {
        self.events = Some(events);
        self
    }

    fn record(&self, call: TransportCall) {
        self.log.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    async fn initialize(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Initialize);
        if self.log.inner.lock().unwrap().fail_init {
            return Err(TransportError::Backend("no adapter".into()));
        }
        Ok(())
    }

    async fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        self.record(TransportCall::Connect(address.to_string()));
        if let Some(events) = &self.events {
            events.post(vec![TransportEvent::Connected, TransportEvent::ServicesDiscovered]);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }

    async fn read_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Read(characteristic.uuid));
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        characteristic: &GattCharacteristic,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Write(characteristic.uuid, value.to_vec()));
        if self.log.inner.lock().unwrap().fail_write {
            return Err(TransportError::OperationFailed("write rejected".into()));
        }
        Ok(())
    }

    async fn set_characteristic_notification(
        &mut self,
        characteristic: &GattCharacteristic,
        enabled: bool,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Notify(characteristic.uuid, enabled));
        if enabled && self.log.inner.lock().unwrap().fail_notify {
            return Err(TransportError::OperationFailed("cccd write rejected".into()));
        }
        Ok(())
    }

    async fn supported_attribute_tree(&mut self) -> Result<AttributeTree, TransportError> {
        self.record(TransportCall::AttributeTree);
        Ok(self.log.inner.lock().unwrap().tree.clone())
    }
}

// ── Attribute trees ───────────────────────────────────────────

pub fn sensor(uuid: Uuid) -> GattCharacteristic {
    GattCharacteristic::new(
        uuid,
        CharacteristicProperties::READ.union(CharacteristicProperties::NOTIFY),
    )
}

pub fn actuator() -> GattCharacteristic {
    GattCharacteristic::new(UUID_DEVICE_ON_OFF, CharacteristicProperties::WRITE)
}

#[allow(dead_code)]
pub fn primary_only_tree() -> AttributeTree {
    vec![
        GattService::new(
            UUID_DEVICE_INFORMATION_SERVICE,
            vec![GattCharacteristic::new(UUID_DEVICE_NAME, CharacteristicProperties::READ)],
        ),
        GattService::new(
            UUID_LUNCHBOX_SERVICE,
            vec![sensor(UUID_TEMPERATURE_SENSOR_1), actuator()],
        ),
    ]
}

#[allow(dead_code)]
pub fn full_tree() -> AttributeTree {
    vec![GattService::new(
        UUID_LUNCHBOX_SERVICE,
        vec![
            sensor(UUID_TEMPERATURE_SENSOR_1),
            sensor(UUID_TEMPERATURE_SENSOR_2),
            actuator(),
        ],
    )]
}

#[allow(dead_code)]
pub fn foreign_tree() -> AttributeTree {
    vec![GattService::new(
        UUID_DEVICE_INFORMATION_SERVICE,
        vec![sensor(UUID_TEMPERATURE_SENSOR_1)],
    )]
}

// ── Harness ───────────────────────────────────────────────────

pub const TEST_ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

pub struct Harness {
    pub handle: ControllerHandle,
    pub events: TransportEventSender,
    pub display: mpsc::UnboundedReceiver<DisplayEvent>,
    pub log: MockLog,
    pub task: JoinHandle<Result<(), ControllerError>>,
}

#[allow(dead_code)]
impl Harness {
    /// Starts a controller that does not connect on its own.
    pub fn start(tree: AttributeTree) -> Self {
        Self::start_with(
            tree,
            ControllerConfig {
                device_address: TEST_ADDRESS.into(),
                auto_connect: false,
                ..Default::default()
            },
            |_| {},
        )
    }

    /// Starts a controller whose transport posts its own connect events.
    pub fn start_posting(tree: AttributeTree) -> Self {
        Self::build(
            tree,
            ControllerConfig {
                device_address: TEST_ADDRESS.into(),
                auto_connect: false,
                ..Default::default()
            },
            |_| {},
            true,
        )
    }

    pub fn start_with(
        tree: AttributeTree,
        config: ControllerConfig,
        prepare: impl FnOnce(&MockLog),
    ) -> Self {
        Self::build(tree, config, prepare, false)
    }

    fn build(
        tree: AttributeTree,
        config: ControllerConfig,
        prepare: impl FnOnce(&MockLog),
        posting: bool,
    ) -> Self {
        let (handle, events, inbox) = channel(config.event_channel_capacity);
        let (mut transport, log) = MockTransport::new(tree);
        if posting {
            transport = transport.with_events(events.clone());
        }
        prepare(&log);
        let (display_tx, display) = mpsc::unbounded_channel();
        let controller = DeviceController::new(config, transport, display_tx, inbox);
        let task = tokio::spawn(controller.run());
        Self {
            handle,
            events,
            display,
            log,
            task,
        }
    }

    pub async fn send(&self, event: TransportEvent) {
        assert!(self.events.send(event).await, "controller stopped");
    }

    /// Snapshot taken after every earlier message has been handled.
    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.handle.snapshot().await.expect("controller running")
    }

    /// Polls snapshots in real time until `done` holds, giving up after a
    /// couple of seconds.
    pub async fn wait_for(&self, done: impl Fn(&ControllerSnapshot) -> bool) -> ControllerSnapshot {
        let mut snapshot = self.snapshot().await;
        for _ in 0..200 {
            if done(&snapshot) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            snapshot = self.snapshot().await;
        }
        snapshot
    }

    pub async fn connect_and_discover(&self) -> ControllerSnapshot {
        self.send(TransportEvent::Connected).await;
        self.send(TransportEvent::ServicesDiscovered).await;
        self.snapshot().await
    }

    pub async fn data(&self, uuid: Uuid, payload: &str) {
        self.send(TransportEvent::DataAvailable {
            uuid,
            payload: Some(payload.to_string()),
        })
        .await;
    }

    /// Display events emitted so far.
    pub fn drain_display(&mut self) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.display.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Panics if a notification is ever enabled while another characteristic
/// still holds one.
#[allow(dead_code)]
pub fn assert_single_subscription(calls: &[TransportCall]) {
    let mut enabled: HashSet<Uuid> = HashSet::new();
    for call in calls {
        match call {
            TransportCall::Notify(uuid, true) => {
                assert!(
                    enabled.iter().all(|u| u == uuid),
                    "enabled {} while {:?} still subscribed",
                    uuid,
                    enabled
                );
                enabled.insert(*uuid);
            }
            TransportCall::Notify(uuid, false) => {
                enabled.remove(uuid);
            }
            _ => {}
        }
    }
}
