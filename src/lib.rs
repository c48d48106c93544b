//! BLE session driver for a SensorTag-style weather station peripheral.
//!
//! The peripheral exposes pressure, humidity, and a raw serial tunnel as
//! independent GATT services that share one radio transaction channel. This
//! crate owns the link lifecycle, walks the strict per-sensor activation
//! sequence (enable config, arm notifications, read) one operation at a
//! time, decodes the raw characteristic payloads into calibrated physical
//! readings, and fans the results out to collaborators over a typed
//! publish/subscribe bus.
//!
//! Scanning, pairing prompts, and presentation are external collaborators:
//! they drive the session through [`SessionCommand`]s and observe it through
//! [`ReadingBus`] subscriptions.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::bus::{ReadingBus, SubscriberId};
pub use domain::calibration::BaroCalibration;
pub use domain::models::{
    LinkState, PeripheralAddress, SensorReading, SessionEvent, PRESSURE_RAW_TO_IN_HG,
};
pub use domain::settings::{Settings, SettingsService};
pub use error::{DecodeError, SessionError};
#[cfg(feature = "hardware")]
pub use infrastructure::bluetooth::central::BtleplugTransport;
pub use infrastructure::bluetooth::service::{SessionCommand, StationService};
pub use infrastructure::bluetooth::session::SensorSession;
pub use infrastructure::bluetooth::transport::{
    GattStatus, GattTransport, ServiceCatalog, TransportEvent,
};
