//! Transport seam between the session driver and the platform BLE stack.
//!
//! The radio permits a single outstanding GATT operation; every operation
//! issued through [`GattTransport`] completes later as a [`TransportEvent`]
//! delivered on the session's event channel. The driver never issues a new
//! operation except in response to the previous completion, so the trait
//! implementations do not need their own queueing.

use crate::domain::models::{LinkState, PeripheralAddress};
use crate::error::SessionError;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Completion status reported by the transport for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    /// Raw transport status code for a failed operation.
    Failure(u8),
}

impl GattStatus {
    pub fn is_success(self) -> bool {
        matches!(self, GattStatus::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GattStatus::Success => f.write_str("success"),
            GattStatus::Failure(code) => write!(f, "status 0x{code:02x}"),
        }
    }
}

/// Immutable snapshot of the peripheral's services and characteristics,
/// built once per discovery and replaced wholesale by the next one.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: HashMap<Uuid, Vec<Uuid>>,
}

impl ServiceCatalog {
    pub fn new(services: impl IntoIterator<Item = (Uuid, Vec<Uuid>)>) -> Self {
        Self {
            services: services.into_iter().collect(),
        }
    }

    pub fn has_service(&self, service: Uuid) -> bool {
        self.services.contains_key(&service)
    }

    pub fn has_characteristic(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.services
            .get(&service)
            .is_some_and(|chars| chars.contains(&characteristic))
    }

    pub fn characteristics(&self, service: Uuid) -> Option<&[Uuid]> {
        self.services.get(&service).map(Vec::as_slice)
    }

    pub fn services(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.services.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Completion callback from the transport. All variants are delivered on
/// one channel and consumed by a single task.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The link came up or went down.
    ConnectionStateChanged {
        status: GattStatus,
        state: LinkState,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        status: GattStatus,
        catalog: ServiceCatalog,
    },
    /// A characteristic write completed.
    CharacteristicWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    /// A descriptor write completed.
    DescriptorWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    /// A characteristic read completed.
    CharacteristicRead {
        characteristic: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    },
    /// The peripheral pushed a new value for an armed characteristic.
    CharacteristicChanged {
        characteristic: Uuid,
        value: Vec<u8>,
    },
}

/// Operations the session driver needs from a BLE central implementation.
///
/// Methods other than `connect` are fire-and-forget: errors surface as
/// failed completions, mirroring how the radio itself reports them.
pub trait GattTransport {
    /// Start a connection attempt to `address`. The outcome arrives later
    /// as [`TransportEvent::ConnectionStateChanged`].
    fn connect(&mut self, address: &PeripheralAddress) -> Result<(), SessionError>;

    /// Request an orderly link teardown. Completion is event-driven; there
    /// is nothing to wait on here.
    fn disconnect(&mut self);

    /// Release the link resource. Idempotent, safe without an active link.
    fn close(&mut self);

    /// Enumerate services and characteristics on the connected peripheral.
    fn discover_services(&mut self);

    fn write_characteristic(&mut self, service: Uuid, characteristic: Uuid, value: &[u8]);

    fn write_descriptor(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    );

    fn read_characteristic(&mut self, service: Uuid, characteristic: Uuid);

    /// Arm or disarm local delivery of notifications for a characteristic.
    fn set_characteristic_notification(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    );
}
