//! Core functionality for the Lunchbox controller
//! Attribute classification, reading interpretation and the Bluetooth
//! session machinery.

pub mod bluetooth;
pub mod classifier;
pub mod reading;

// Re-export commonly used types
pub use bluetooth::{ControllerHandle, DeviceController};
pub use classifier::{ClassifiedSet, classify};
pub use reading::{DisplayReadingState, ReadingInterpreter, ReadingUpdate};
