//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Operation flags a characteristic advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl CharacteristicProperties {
    pub const READ: Self = Self { read: true, write: false, notify: false };
    pub const NOTIFY: Self = Self { read: false, write: false, notify: true };
    pub const WRITE: Self = Self { read: false, write: true, notify: false };

    /// Returns the union of both flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self {
            read: self.read || other.read,
            write: self.write || other.write,
            notify: self.notify || other.notify,
        }
    }
}

/// A characteristic as discovered on the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

impl GattCharacteristic {
    pub fn new(uuid: Uuid, properties: CharacteristicProperties) -> Self {
        Self { uuid, properties }
    }

    pub fn is_readable(&self) -> bool {
        self.properties.read
    }

    pub fn is_notifiable(&self) -> bool {
        self.properties.notify
    }
}

/// A service and its characteristics, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn new(uuid: Uuid, characteristics: Vec<GattCharacteristic>) -> Self {
        Self { uuid, characteristics }
    }
}

/// The full attribute tree reported by the transport after discovery.
pub type AttributeTree = Vec<GattService>;

/// Application meaning of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    SensorPrimary,
    SensorSecondary,
    Actuator,
    Unclassified,
}

impl Role {
    pub fn is_sensor(self) -> bool {
        matches!(self, Role::SensorPrimary | Role::SensorSecondary)
    }
}

/// Link state as last reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("Disconnected"),
            ConnectionState::Connected => f.write_str("Connected"),
        }
    }
}

/// Heater state, flipped only after a confirmed write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ActuatorState {
    #[default]
    Inactive,
    Active,
}

impl ActuatorState {
    pub fn toggled(self) -> Self {
        match self {
            ActuatorState::Inactive => ActuatorState::Active,
            ActuatorState::Active => ActuatorState::Inactive,
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorState::Inactive => f.write_str("Inactive"),
            ActuatorState::Active => f.write_str("Active"),
        }
    }
}
