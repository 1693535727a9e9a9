//! Constants used throughout the application
//! This module contains the attribute UUIDs of the Lunchbox peripheral,
//! actuator payloads and polling periods.

use uuid::Uuid;

/// Standard Bluetooth Service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
pub const UUID_MANUFACTURER_NAME: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);

/// The UUID of the Lunchbox service
pub const UUID_LUNCHBOX_SERVICE: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// The UUID of the first temperature sensor characteristic
pub const UUID_TEMPERATURE_SENSOR_1: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// The UUID of the second temperature sensor characteristic
pub const UUID_TEMPERATURE_SENSOR_2: Uuid = Uuid::from_u128(0x0000ffe2_0000_1000_8000_00805f9b34fb);

/// The UUID of the heater on/off characteristic
pub const UUID_DEVICE_ON_OFF: Uuid = Uuid::from_u128(0x0000ffe3_0000_1000_8000_00805f9b34fb);

/// Value written to the on/off characteristic to activate the heater
pub const ACTUATOR_ON_VALUE: u8 = 0x11;

/// Value written to the on/off characteristic to deactivate the heater
pub const ACTUATOR_OFF_VALUE: u8 = 0x00;

/// Polling period when only the first sensor is present, in milliseconds
pub const DEFAULT_SHORT_POLL_INTERVAL_MS: u64 = 1000;

/// Polling period once the second sensor is present, in milliseconds
pub const DEFAULT_LONG_POLL_INTERVAL_MS: u64 = 2000;

/// Readings are accepted in `[0, READING_UPPER_BOUND)`
pub const READING_UPPER_BOUND: i64 = 256;

/// Scan duration in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// Capacity of the controller mailbox
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

pub const UNKNOWN_SERVICE: &str = "Unknown service";
pub const UNKNOWN_CHARACTERISTIC: &str = "Unknown characteristic";

const ATTRIBUTE_NAMES: &[(Uuid, &str)] = &[
    (UUID_GENERIC_ACCESS_SERVICE, "Generic Access"),
    (UUID_DEVICE_INFORMATION_SERVICE, "Device Information Service"),
    (UUID_DEVICE_NAME, "Device Name"),
    (UUID_MANUFACTURER_NAME, "Manufacturer Name String"),
    (UUID_LUNCHBOX_SERVICE, "Lunchbox Service"),
    (UUID_TEMPERATURE_SENSOR_1, "Temperature Sensor 1"),
    (UUID_TEMPERATURE_SENSOR_2, "Temperature Sensor 2"),
    (UUID_DEVICE_ON_OFF, "Device On/Off"),
];

/// Human readable name of a known attribute, or `default` when unknown.
pub fn lookup(uuid: &Uuid, default: &'static str) -> &'static str {
    ATTRIBUTE_NAMES
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| *name)
        .unwrap_or(default)
}
