//! Bluetooth Module
//!
//! BLE session driver for the weather station peripheral.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     StationService                       │
//! │   (single task: command channel + transport events)      │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!               ┌───────▼────────┐
//!               │  SensorSession │  link state, catalog,
//!               │                │  calibration, decoding
//!               └───┬────────┬───┘
//!                   │        │
//!          ┌────────▼──┐  ┌──▼───────────┐
//!          │ Sequencer │  │ GattTransport │
//!          │ (GattOps) │  │  (trait seam) │
//!          └───────────┘  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, the activation table, and payload decoding
//! - [`sequencer`] - one-operation-at-a-time activation state machine
//! - [`session`] - connection lifecycle and event handling
//! - [`service`] - async coordinator task
//! - [`transport`] - seam to the platform BLE stack
//! - `central` - btleplug transport implementation (feature `hardware`)

#[cfg(feature = "hardware")]
pub mod central;
pub mod protocol;
pub mod sequencer;
pub mod service;
pub mod session;
pub mod transport;

// Re-export the service surface for convenience
pub use service::{SessionCommand, StationService};
pub use session::SensorSession;
