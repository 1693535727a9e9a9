//! Attribute classification
//! Walks a discovered attribute tree and assigns each characteristic of the
//! Lunchbox service a [`Role`]. Unknown services and characteristics are
//! ignored.

use log::debug;
use serde::Serialize;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    self, UNKNOWN_CHARACTERISTIC, UUID_DEVICE_ON_OFF, UUID_LUNCHBOX_SERVICE,
    UUID_TEMPERATURE_SENSOR_1, UUID_TEMPERATURE_SENSOR_2,
};
use crate::core::bluetooth::{AttributeTree, GattCharacteristic, Role};

/// Maps a characteristic UUID to its role.
pub fn role_of(uuid: &Uuid) -> Role {
    if *uuid == UUID_TEMPERATURE_SENSOR_1 {
        Role::SensorPrimary
    } else if *uuid == UUID_TEMPERATURE_SENSOR_2 {
        Role::SensorSecondary
    } else if *uuid == UUID_DEVICE_ON_OFF {
        Role::Actuator
    } else {
        Role::Unclassified
    }
}

/// Characteristics bound to a role during one discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedSet {
    /// Sensor characteristics in discovery order.
    sensors: Vec<(Role, GattCharacteristic)>,
    actuator: Option<GattCharacteristic>,
}

impl ClassifiedSet {
    /// True when nothing in the tree matched a known role.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.actuator.is_none()
    }

    /// Bound sensors with their roles, in discovery order.
    pub fn sensors(&self) -> impl Iterator<Item = (Role, &GattCharacteristic)> {
        self.sensors.iter().map(|(role, c)| (*role, c))
    }

    /// The characteristic bound to `role`, if any.
    pub fn get(&self, role: Role) -> Option<&GattCharacteristic> {
        match role {
            Role::Actuator => self.actuator.as_ref(),
            Role::Unclassified => None,
            sensor => self
                .sensors
                .iter()
                .find(|(r, _)| *r == sensor)
                .map(|(_, c)| c),
        }
    }

    /// The heater on/off characteristic, if bound.
    pub fn actuator(&self) -> Option<&GattCharacteristic> {
        self.actuator.as_ref()
    }

    /// Roles currently bound, sensors first.
    pub fn bound_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.sensors.iter().map(|(r, _)| *r).collect();
        if self.actuator.is_some() {
            roles.push(Role::Actuator);
        }
        roles
    }

    /// True once the secondary sensor is bound; every sensor then polls at
    /// the long period.
    pub fn uses_long_period(&self) -> bool {
        self.get(Role::SensorSecondary).is_some()
    }

    fn bind(&mut self, role: Role, characteristic: &GattCharacteristic) {
        if self.get(role).is_some() {
            debug!("Role {:?} already bound, ignoring duplicate {}", role, characteristic.uuid);
            return;
        }
        if role == Role::Actuator {
            self.actuator = Some(characteristic.clone());
        } else if role.is_sensor() {
            self.sensors.push((role, characteristic.clone()));
        }
    }
}

/// Classifies every characteristic of the Lunchbox service in `tree`.
pub fn classify(tree: &AttributeTree) -> ClassifiedSet {
    let mut classified = ClassifiedSet::default();

    for service in tree.iter().filter(|s| s.uuid == UUID_LUNCHBOX_SERVICE) {
        for characteristic in &service.characteristics {
            let role = role_of(&characteristic.uuid);
            debug!(
                "Characteristic {} ({}) -> {:?}",
                characteristic.uuid,
                constants::lookup(&characteristic.uuid, UNKNOWN_CHARACTERISTIC),
                role
            );
            classified.bind(role, characteristic);
        }
    }

    classified
}
