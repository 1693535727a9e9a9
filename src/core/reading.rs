//! Temperature reading interpretation
//! Turns the text payload of a sensor characteristic into hot/cold display
//! values. A drop since the previous reading lands on the cold channel and
//! drives the overlay intensity; anything else lands on the hot channel.

use serde::Serialize;

use crate::core::bluetooth::constants::READING_UPPER_BOUND;
use crate::error::ReadingError;

/// Display quantities derived from the readings of one connection session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayReadingState {
    pub last_read: u8,
    pub cold: Option<u8>,
    pub hot: Option<u8>,
    /// Alpha level of the cold overlay, proxy for the size of the last drop.
    pub overlay_intensity: u8,
}

/// Outcome of a valid reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingUpdate {
    /// The reading decreased.
    Cold { value: u8, overlay_intensity: u8 },
    /// The reading increased or stayed the same.
    Hot { value: u8 },
}

/// Extracts the reading from a payload: the first line, ignoring trailing
/// empty lines, parsed as an integer and checked against `[0, 256)`.
pub fn parse_reading(raw: Option<&str>) -> Result<u8, ReadingError> {
    let raw = raw.ok_or(ReadingError::Empty)?;
    let mut lines: Vec<&str> = raw.split('\n').collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    let first = lines.first().ok_or(ReadingError::Empty)?;

    let value: i64 = first.parse()?;
    if !(0..READING_UPPER_BOUND).contains(&value) {
        return Err(ReadingError::OutOfRange(value));
    }
    Ok(value as u8)
}

/// Stateful interpreter; `last_read` lives as long as the connection.
#[derive(Debug, Default)]
pub struct ReadingInterpreter {
    state: DisplayReadingState,
}

impl ReadingInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DisplayReadingState {
        &self.state
    }

    /// Applies one payload. On error the state is untouched.
    pub fn interpret(&mut self, raw: Option<&str>) -> Result<ReadingUpdate, ReadingError> {
        let value = parse_reading(raw)?;
        let last = self.state.last_read;
        let difference = value.abs_diff(last);

        let update = if last > value {
            self.state.cold = Some(value);
            self.state.overlay_intensity = difference;
            ReadingUpdate::Cold {
                value,
                overlay_intensity: difference,
            }
        } else {
            self.state.hot = Some(value);
            ReadingUpdate::Hot { value }
        };

        self.state.last_read = value;
        Ok(update)
    }

    /// Forgets everything, as on a fresh connection.
    pub fn reset(&mut self) {
        self.state = DisplayReadingState::default();
    }
}
