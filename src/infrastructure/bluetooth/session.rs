//! Connection/session driver.
//!
//! [`SensorSession`] owns the link state, the discovered service catalog,
//! the pressure calibration, and the activation sequencer, and is the only
//! place transport callbacks mutate session state: every completion flows
//! through [`SensorSession::handle_transport_event`].

use crate::domain::bus::ReadingBus;
use crate::domain::calibration::BaroCalibration;
use crate::domain::models::{LinkState, PeripheralAddress, SensorReading, SessionEvent};
use crate::error::{DecodeError, SessionError};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::sequencer::{Completion, GattOp, SensorSequencer};
use crate::infrastructure::bluetooth::transport::{
    GattStatus, GattTransport, ServiceCatalog, TransportEvent,
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// One BLE sensor session: link lifecycle, activation, decoding.
pub struct SensorSession<T: GattTransport> {
    transport: T,
    bus: ReadingBus,
    link_state: LinkState,
    catalog: Option<ServiceCatalog>,
    calibration: Option<BaroCalibration>,
    sequencer: SensorSequencer,
}

impl<T: GattTransport> SensorSession<T> {
    pub fn new(transport: T, bus: ReadingBus) -> Self {
        Self {
            transport,
            bus,
            link_state: LinkState::Disconnected,
            catalog: None,
            calibration: None,
            sequencer: SensorSequencer::new(),
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    /// Snapshot of the discovered services, if discovery has completed.
    pub fn service_catalog(&self) -> Option<&ServiceCatalog> {
        self.catalog.as_ref()
    }

    /// Bus access for wiring up subscriptions.
    pub fn bus_mut(&mut self) -> &mut ReadingBus {
        &mut self.bus
    }

    /// Start a connection attempt. The result arrives asynchronously via
    /// the transport event channel; callers observe it on the bus.
    pub fn connect(&mut self, address: &PeripheralAddress) -> Result<(), SessionError> {
        if self.link_state != LinkState::Disconnected {
            warn!(%address, state = ?self.link_state, "connect requested while link active, ignoring");
            return Ok(());
        }

        self.transport.connect(address)?;
        self.link_state = LinkState::Connecting;
        info!(%address, "connection attempt started");
        Ok(())
    }

    /// Request an orderly teardown. No-op without an active link; the
    /// `Disconnected` transition arrives via the transport event channel.
    pub fn disconnect(&mut self) {
        if self.link_state == LinkState::Disconnected {
            debug!("disconnect requested with no active link");
            return;
        }
        self.transport.disconnect();
    }

    /// Release the link resource. Idempotent.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Write to the serial tunnel characteristic, outside the activation
    /// sequence. The ack it produces is ignored by the sequencer.
    pub fn send_serial(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.link_state != LinkState::Connected {
            return Err(SessionError::NotConnected);
        }
        let catalog = self.catalog.as_ref().ok_or(SessionError::NotConnected)?;
        if !catalog.has_characteristic(protocol::SERIAL_SERVICE, protocol::SERIAL_CHAR) {
            return Err(SessionError::MissingCharacteristic(protocol::SERIAL_CHAR));
        }

        self.transport
            .write_characteristic(protocol::SERIAL_SERVICE, protocol::SERIAL_CHAR, data);
        Ok(())
    }

    /// Single entry point for all transport callbacks.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged { status, state } => {
                self.on_connection_state(status, state);
            }
            TransportEvent::ServicesDiscovered { status, catalog } => {
                self.on_services_discovered(status, catalog);
            }
            TransportEvent::CharacteristicWrite {
                characteristic,
                status,
            } => {
                self.on_operation_ack(status, Completion::ConfigWritten(characteristic));
            }
            TransportEvent::DescriptorWrite {
                characteristic,
                status,
            } => {
                self.on_operation_ack(status, Completion::DescriptorWritten(characteristic));
            }
            TransportEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            } => {
                self.on_characteristic_read(characteristic, status, value);
            }
            TransportEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                if self.link_state == LinkState::Connected {
                    self.decode_and_publish(characteristic, &value);
                } else {
                    debug!(%characteristic, "notification after teardown, dropping");
                }
            }
        }
    }

    fn on_connection_state(&mut self, status: GattStatus, state: LinkState) {
        match (status.is_success(), state) {
            (true, LinkState::Connected) => {
                self.link_state = LinkState::Connected;
                info!("connected to GATT server");
                self.bus.publish(SessionEvent::Connected);
                self.transport.discover_services();
            }
            (_, LinkState::Disconnected) => self.teardown(),
            (true, _) => {}
            (false, _) => {
                // A failed operation must not leave the link ambiguous:
                // force an explicit disconnect before reporting down.
                warn!(%status, "link failure, forcing disconnect");
                self.transport.disconnect();
                self.teardown();
            }
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus, catalog: ServiceCatalog) {
        if self.link_state != LinkState::Connected {
            debug!("discovery result with no active link, ignoring");
            return;
        }

        if !status.is_success() {
            error!(%status, "service discovery failed");
            self.transport.disconnect();
            self.teardown();
            return;
        }

        info!(services = catalog.len(), "service discovery complete");
        let first_op = self.sequencer.start(&catalog);
        self.catalog = Some(catalog);
        self.bus.publish(SessionEvent::ServicesDiscovered);

        match first_op {
            Some(op) => self.issue(op),
            None => info!("peripheral exposes no sensor channels"),
        }
    }

    fn on_operation_ack(&mut self, status: GattStatus, completion: Completion) {
        if self.link_state != LinkState::Connected {
            debug!(?completion, "completion after teardown, ignoring");
            return;
        }
        if !status.is_success() {
            self.operation_failed(status);
            return;
        }
        self.advance_sequencer(completion);
    }

    fn on_characteristic_read(&mut self, characteristic: Uuid, status: GattStatus, value: Vec<u8>) {
        if self.link_state != LinkState::Connected {
            debug!(%characteristic, "read result after teardown, ignoring");
            return;
        }
        if !status.is_success() {
            self.operation_failed(status);
            return;
        }

        self.decode_and_publish(characteristic, &value);
        self.advance_sequencer(Completion::ValueRead(characteristic));
    }

    fn advance_sequencer(&mut self, completion: Completion) {
        let op = match self.catalog.as_ref() {
            Some(catalog) => self.sequencer.handle_completion(catalog, completion),
            None => None,
        };
        if let Some(op) = op {
            self.issue(op);
        }
    }

    fn issue(&mut self, op: GattOp) {
        match op {
            GattOp::WriteConfig {
                service,
                characteristic,
                value,
            } => {
                self.transport
                    .write_characteristic(service, characteristic, &[value]);
            }
            GattOp::ArmNotifications {
                service,
                characteristic,
                descriptor,
                value,
            } => {
                self.transport
                    .set_characteristic_notification(service, characteristic, true);
                self.transport
                    .write_descriptor(service, characteristic, descriptor, &value);
            }
            GattOp::ReadValue {
                service,
                characteristic,
            } => {
                self.transport.read_characteristic(service, characteristic);
            }
        }
    }

    /// Any transport-level operation failure tears the link down; the
    /// session never retries on its own.
    fn operation_failed(&mut self, status: GattStatus) {
        warn!(%status, "GATT operation failed, tearing the link down");
        self.transport.disconnect();
        self.teardown();
    }

    /// Drop to `Disconnected` and invalidate everything scoped to the
    /// connection. Safe to reach twice; the second call is a no-op.
    fn teardown(&mut self) {
        if self.link_state == LinkState::Disconnected {
            return;
        }

        info!("disconnected from GATT server");
        self.link_state = LinkState::Disconnected;
        self.catalog = None;
        self.calibration = None;
        self.sequencer.reset();
        self.bus.publish(SessionEvent::Disconnected);
    }

    fn decode_and_publish(&mut self, characteristic: Uuid, payload: &[u8]) {
        if characteristic == protocol::PRESSURE_CAL_CHAR {
            match BaroCalibration::parse(payload) {
                Ok(calibration) => {
                    debug!(coefficients = ?calibration.coefficients(), "pressure calibration stored");
                    self.calibration = Some(calibration);
                }
                Err(e) => self.decode_failed(e),
            }
        } else if characteristic == protocol::PRESSURE_DATA_CHAR {
            let decoded = match self.calibration.as_ref() {
                Some(calibration) => protocol::decode_pressure(payload, calibration),
                None => Err(DecodeError::MissingCalibration),
            };
            match decoded {
                Ok(pressure) => {
                    self.bus
                        .publish(SessionEvent::Reading(SensorReading::Pressure(pressure)));
                }
                Err(e) => self.decode_failed(e),
            }
        } else if characteristic == protocol::HUMIDITY_DATA_CHAR {
            match protocol::decode_humidity(payload) {
                Ok((temp_f, humidity)) => {
                    self.bus
                        .publish(SessionEvent::Reading(SensorReading::Temperature(temp_f)));
                    self.bus
                        .publish(SessionEvent::Reading(SensorReading::Humidity(humidity)));
                }
                Err(e) => self.decode_failed(e),
            }
        } else if characteristic == protocol::SERIAL_CHAR {
            if let Some(text) = protocol::decode_raw_serial(payload) {
                self.bus
                    .publish(SessionEvent::Reading(SensorReading::RawSerial(text)));
            }
        } else {
            trace!(%characteristic, len = payload.len(), "value from unhandled characteristic");
        }
    }

    /// Decode failures are local: drop the payload, report it, leave the
    /// link and sequence untouched.
    fn decode_failed(&mut self, error: DecodeError) {
        warn!(%error, "payload decode failed");
        self.bus.publish(SessionEvent::DecodeError(error));
    }
}
