use crate::error::DecodeError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display-only conversion factor from the peripheral's native raw pressure
/// unit to inches of mercury. Decoded `Pressure` readings stay in the raw
/// unit; presentation layers apply this.
pub const PRESSURE_RAW_TO_IN_HG: f64 = 0.000296;

/// Transport address of the remote peripheral, `AA:BB:CC:DD:EE:FF` form.
///
/// Parsing validates the shape up front so a connection attempt never starts
/// with a malformed address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralAddress(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed peripheral address {0:?}")]
pub struct AddressParseError(String);

impl PeripheralAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PeripheralAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split(':').collect();
        let well_formed = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));

        if well_formed {
            Ok(Self(s.to_ascii_uppercase()))
        } else {
            Err(AddressParseError(s.to_string()))
        }
    }
}

impl fmt::Display for PeripheralAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of the physical link, owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// A decoded sensor value. Ephemeral: produced, published, not retained.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    /// Compensated barometric pressure in the peripheral's native raw unit.
    Pressure(f64),
    /// Ambient temperature in degrees Fahrenheit.
    Temperature(f64),
    /// Relative humidity in percent.
    Humidity(f64),
    /// Text payload received over the serial tunnel characteristic.
    RawSerial(String),
}

/// Event published on the [`ReadingBus`](crate::domain::bus::ReadingBus).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    ServicesDiscovered,
    Reading(SensorReading),
    DecodeError(DecodeError),
}
