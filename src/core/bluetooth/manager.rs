//! Device controller for the Lunchbox peripheral
//! A single task owns every piece of session state. Transport events, user
//! requests and polling ticks all arrive on one mailbox and are handled one
//! at a time.

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::core::bluetooth::commands::{
    ActuatorCommand, ControllerInbox, ControllerMessage, ControllerRequest,
};
use crate::core::bluetooth::constants::{self, UNKNOWN_CHARACTERISTIC, UNKNOWN_SERVICE};
use crate::core::bluetooth::notification::NotificationArbiter;
use crate::core::bluetooth::scheduler::{PollingScheduler, poll_cycle};
use crate::core::bluetooth::transport::{GattTransport, TransportEvent};
use crate::core::bluetooth::types::{ActuatorState, ConnectionState, Role};
use crate::core::classifier::{ClassifiedSet, classify};
use crate::core::reading::{DisplayReadingState, ReadingInterpreter, ReadingUpdate};
use crate::display::{DisplayEvent, DisplaySink};
use crate::error::ControllerError;

/// Point-in-time view of the controller, for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub connection_state: ConnectionState,
    pub bound_roles: Vec<Role>,
    pub notify_target: Option<Uuid>,
    pub readings: DisplayReadingState,
    pub actuator_state: ActuatorState,
    pub active_polling_jobs: usize,
}

/// Connection lifecycle state machine for one peripheral.
pub struct DeviceController<T: GattTransport, S: DisplaySink> {
    config: ControllerConfig,
    transport: T,
    sink: S,
    rx: mpsc::Receiver<ControllerMessage>,
    mailbox: mpsc::WeakSender<ControllerMessage>,
    state_tx: watch::Sender<ConnectionState>,
    connection_state: ConnectionState,
    classified: ClassifiedSet,
    arbiter: NotificationArbiter,
    scheduler: PollingScheduler,
    interpreter: ReadingInterpreter,
    actuator_state: ActuatorState,
    cancel_token: CancellationToken,
}

impl<T: GattTransport, S: DisplaySink> DeviceController<T, S> {
    pub fn new(config: ControllerConfig, transport: T, sink: S, inbox: ControllerInbox) -> Self {
        let cancel_token = CancellationToken::new();
        let scheduler = PollingScheduler::new(config.poll_periods(), cancel_token.clone());
        Self {
            config,
            transport,
            sink,
            rx: inbox.rx,
            mailbox: inbox.mailbox,
            state_tx: inbox.state_tx,
            connection_state: ConnectionState::Disconnected,
            classified: ClassifiedSet::default(),
            arbiter: NotificationArbiter::new(),
            scheduler,
            interpreter: ReadingInterpreter::new(),
            actuator_state: ActuatorState::Inactive,
            cancel_token,
        }
    }

    /// Runs the controller until shutdown.
    ///
    /// Fails only when the transport cannot be initialized, in which case no
    /// other transport call is made.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        if let Err(e) = self.transport.initialize().await {
            error!("Unable to initialize Bluetooth: {}", e);
            self.cancel_token.cancel();
            return Err(ControllerError::TransportInit(e));
        }
        info!("Bluetooth transport initialized");

        if self.config.auto_connect {
            self.connect().await;
        }

        while let Some(message) = self.rx.recv().await {
            match message {
                ControllerMessage::Request(ControllerRequest::Shutdown) => break,
                ControllerMessage::Transport(event) => self.handle_transport_event(event).await,
                ControllerMessage::Request(request) => self.handle_request(request).await,
                ControllerMessage::PollTick { session, role } => {
                    self.handle_poll_tick(session, role).await
                }
            }
        }

        let cancelled = self.scheduler.cancel_all();
        self.cancel_token.cancel();
        info!("Device controller stopped, {} polling job(s) cancelled", cancelled);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.set_connection_state(ConnectionState::Connected);
            }
            TransportEvent::Disconnected => {
                self.set_connection_state(ConnectionState::Disconnected);
                self.end_session();
            }
            TransportEvent::ServicesDiscovered => self.on_services_discovered().await,
            TransportEvent::DataAvailable { uuid, payload } => {
                self.on_data_available(uuid, payload.as_deref());
            }
        }
    }

    async fn handle_request(&mut self, request: ControllerRequest) {
        match request {
            ControllerRequest::Connect => self.connect().await,
            ControllerRequest::Disconnect => {
                if let Err(e) = self.transport.disconnect().await {
                    warn!("Disconnect request failed: {}", e);
                }
            }
            ControllerRequest::ToggleActuator(reply) => {
                let result = self.toggle_actuator().await;
                if reply.send(result).is_err() {
                    debug!("Toggle requester went away before the reply");
                }
            }
            ControllerRequest::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot requester went away before the reply");
                }
            }
            ControllerRequest::Shutdown => {}
        }
    }

    async fn connect(&mut self) {
        let address = self.config.device_address.clone();
        if address.trim().is_empty() {
            warn!("No device address configured, not connecting");
            return;
        }
        let result = self.transport.connect(&address).await;
        match &result {
            Ok(()) => info!("Connect request result=true ({})", address),
            Err(e) => warn!("Connect request result=false ({}): {}", address, e),
        }
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection_state != state {
            info!("Connection state {} -> {}", self.connection_state, state);
        }
        self.connection_state = state;
        self.state_tx.send_replace(state);
        self.sink.emit(DisplayEvent::ConnectionStateChanged(state));
    }

    /// Drops everything tied to the link. Makes no transport calls.
    fn end_session(&mut self) {
        let cancelled = self.scheduler.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} polling job(s)", cancelled);
        }
        self.arbiter.forget();
        self.classified = ClassifiedSet::default();
        self.interpreter.reset();
        self.sink.emit(DisplayEvent::ReadingsCleared);
    }

    async fn on_services_discovered(&mut self) {
        if self.connection_state != ConnectionState::Connected {
            warn!("Services discovered while disconnected, ignoring");
            return;
        }

        let tree = match self.transport.supported_attribute_tree().await {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Failed to fetch attribute tree: {}", e);
                return;
            }
        };

        for service in &tree {
            debug!(
                "Service {} ({}) with {} characteristic(s)",
                constants::lookup(&service.uuid, UNKNOWN_SERVICE),
                service.uuid,
                service.characteristics.len()
            );
        }

        // Discovery replaces the previous classification entirely.
        self.scheduler.cancel_all();
        if let Err(e) = self.arbiter.set_target(&mut self.transport, None).await {
            warn!("Failed to clear notification target: {}", e);
        }
        self.classified = classify(&tree);

        if self.classified.is_empty() {
            info!("Lunchbox service not found among {} service(s)", tree.len());
            return;
        }
        for role in self.classified.bound_roles() {
            if let Some(characteristic) = self.classified.get(role) {
                info!(
                    "Bound {:?} to {} ({})",
                    role,
                    constants::lookup(&characteristic.uuid, UNKNOWN_CHARACTERISTIC),
                    characteristic.uuid
                );
            }
        }

        let secondary_present = self.classified.uses_long_period();
        let periods = self.scheduler.periods();
        let sensors: Vec<_> = self
            .classified
            .sensors()
            .map(|(role, c)| (role, c.clone()))
            .collect();

        for (role, characteristic) in sensors {
            poll_cycle(&mut self.transport, &mut self.arbiter, &characteristic).await;
            let period = periods.period_for(role, secondary_present);
            self.scheduler.start(role, period, self.mailbox.clone());
        }
    }

    async fn handle_poll_tick(&mut self, session: u64, role: Role) {
        if !self.scheduler.accepts_tick(session, role)
            || self.connection_state != ConnectionState::Connected
        {
            debug!("Dropping stale poll tick for {:?}", role);
            return;
        }
        let Some(characteristic) = self.classified.get(role).cloned() else {
            return;
        };
        debug!("Polling {:?} ({})", role, characteristic.uuid);
        poll_cycle(&mut self.transport, &mut self.arbiter, &characteristic).await;
    }

    fn on_data_available(&mut self, uuid: Uuid, payload: Option<&str>) {
        if self.connection_state != ConnectionState::Connected {
            debug!("Dropping data from {} received while disconnected", uuid);
            return;
        }
        match self.interpreter.interpret(payload) {
            Ok(ReadingUpdate::Cold {
                value,
                overlay_intensity,
            }) => {
                debug!("Reading {} from {} went cold", value, uuid);
                self.sink.emit(DisplayEvent::OverlayIntensity(overlay_intensity));
                self.sink.emit(DisplayEvent::ColdValue(value.to_string()));
            }
            Ok(ReadingUpdate::Hot { value }) => {
                debug!("Reading {} from {} went hot", value, uuid);
                self.sink.emit(DisplayEvent::HotValue(value.to_string()));
            }
            Err(e) => warn!("Dropping payload from {}: {}", uuid, e),
        }
    }

    async fn toggle_actuator(&mut self) -> Result<ActuatorState, ControllerError> {
        let actuator = self
            .classified
            .actuator()
            .cloned()
            .ok_or(ControllerError::ActuatorUnavailable)?;

        let command = ActuatorCommand::toggling(self.actuator_state);
        info!("Sending actuator command: {:?}", command);
        if let Err(e) = self
            .transport
            .write_characteristic(&actuator, &command.to_bytes())
            .await
        {
            warn!("Actuator write failed, state stays {}: {}", self.actuator_state, e);
            return Err(e.into());
        }

        self.actuator_state = self.actuator_state.toggled();
        self.sink
            .emit(DisplayEvent::ActuatorStateChanged(self.actuator_state));
        Ok(self.actuator_state)
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            connection_state: self.connection_state,
            bound_roles: self.classified.bound_roles(),
            notify_target: self.arbiter.target().map(|c| c.uuid),
            readings: self.interpreter.state().clone(),
            actuator_state: self.actuator_state,
            active_polling_jobs: self.scheduler.active_jobs(),
        }
    }
}
