//! btleplug-backed [`GattTransport`] (feature `hardware`).
//!
//! Bridges the session driver's callback model onto btleplug's async API:
//! each operation runs on its own task and reports back as a
//! [`TransportEvent`]. The session issues at most one sequencer operation at
//! a time, so these tasks never overlap on the radio.
//!
//! btleplug manages the client characteristic configuration descriptor
//! itself, so a CCCD write maps to `subscribe`/`unsubscribe` rather than a
//! raw descriptor write.

use crate::domain::models::{LinkState, PeripheralAddress};
use crate::error::SessionError;
use crate::infrastructure::bluetooth::protocol::{
    CLIENT_CONFIG_DESCRIPTOR, ENABLE_NOTIFICATION_VALUE,
};
use crate::infrastructure::bluetooth::transport::{
    GattStatus, GattTransport, ServiceCatalog, TransportEvent,
};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Generic failure code reported when btleplug gives us no ATT status.
const GATT_INTERNAL_ERROR: u8 = 0x85;
/// Reported when the requested characteristic is not on the peripheral.
const GATT_ATTR_NOT_FOUND: u8 = 0x0a;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);
const SCAN_ATTEMPTS: u32 = 20;

/// Cross-platform BLE central transport.
pub struct BtleplugTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    peripheral: Arc<Mutex<Option<Peripheral>>>,
}

impl BtleplugTransport {
    /// `events` is the channel the owning service drains; every operation
    /// issued through this transport completes there.
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            peripheral: Arc::new(Mutex::new(None)),
        }
    }

    fn current_peripheral(&self) -> Option<Peripheral> {
        match self.peripheral.lock() {
            Ok(slot) => slot.clone(),
            Err(_) => {
                warn!("peripheral slot poisoned");
                None
            }
        }
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            warn!("transport event channel closed");
        }
    }
}

/// Scan until the peripheral with `address` shows up, then connect to it.
async fn establish(address: String) -> Result<(Adapter, Peripheral), btleplug::Error> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(btleplug::Error::DeviceNotFound)?;

    adapter.start_scan(ScanFilter::default()).await?;
    for _ in 0..SCAN_ATTEMPTS {
        tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        for peripheral in adapter.peripherals().await? {
            if peripheral
                .address()
                .to_string()
                .eq_ignore_ascii_case(&address)
            {
                let _ = adapter.stop_scan().await;
                peripheral.connect().await?;
                return Ok((adapter, peripheral));
            }
        }
    }

    let _ = adapter.stop_scan().await;
    Err(btleplug::Error::DeviceNotFound)
}

fn find_characteristic(
    peripheral: &Peripheral,
    service: Uuid,
    characteristic: Uuid,
) -> Option<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == characteristic && c.service_uuid == service)
}

impl GattTransport for BtleplugTransport {
    fn connect(&mut self, address: &PeripheralAddress) -> Result<(), SessionError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| SessionError::ConnectFailed)?;

        let events = self.events.clone();
        let slot = Arc::clone(&self.peripheral);
        let address = address.to_string();

        handle.spawn(async move {
            match establish(address).await {
                Ok((adapter, peripheral)) => {
                    info!("peripheral connected");
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(peripheral.clone());
                    }

                    // Forward pushed values for armed characteristics.
                    match peripheral.notifications().await {
                        Ok(mut notifications) => {
                            let forward = events.clone();
                            tokio::spawn(async move {
                                while let Some(notification) = notifications.next().await {
                                    let _ = forward.send(TransportEvent::CharacteristicChanged {
                                        characteristic: notification.uuid,
                                        value: notification.value,
                                    });
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "notification stream unavailable"),
                    }

                    // Watch for the link dropping.
                    match adapter.events().await {
                        Ok(mut central_events) => {
                            let watch_events = events.clone();
                            let watch_slot = Arc::clone(&slot);
                            let peripheral_id = peripheral.id();
                            tokio::spawn(async move {
                                while let Some(event) = central_events.next().await {
                                    if let CentralEvent::DeviceDisconnected(id) = event {
                                        if id == peripheral_id {
                                            if let Ok(mut guard) = watch_slot.lock() {
                                                *guard = None;
                                            }
                                            let _ = watch_events.send(
                                                TransportEvent::ConnectionStateChanged {
                                                    status: GattStatus::Success,
                                                    state: LinkState::Disconnected,
                                                },
                                            );
                                            break;
                                        }
                                    }
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "central event stream unavailable"),
                    }

                    let _ = events.send(TransportEvent::ConnectionStateChanged {
                        status: GattStatus::Success,
                        state: LinkState::Connected,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "connection attempt failed");
                    let _ = events.send(TransportEvent::ConnectionStateChanged {
                        status: GattStatus::Failure(GATT_INTERNAL_ERROR),
                        state: LinkState::Disconnected,
                    });
                }
            }
        });

        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(peripheral) = self.current_peripheral() else {
            debug!("disconnect with no peripheral");
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "disconnect request failed");
            }
        });
    }

    fn close(&mut self) {
        if let Ok(mut slot) = self.peripheral.lock() {
            *slot = None;
        }
    }

    fn discover_services(&mut self) {
        let events = self.events.clone();
        let Some(peripheral) = self.current_peripheral() else {
            self.emit(TransportEvent::ServicesDiscovered {
                status: GattStatus::Failure(GATT_INTERNAL_ERROR),
                catalog: ServiceCatalog::default(),
            });
            return;
        };

        tokio::spawn(async move {
            let event = match peripheral.discover_services().await {
                Ok(()) => {
                    let catalog = ServiceCatalog::new(peripheral.services().into_iter().map(|s| {
                        let characteristics: Vec<Uuid> =
                            s.characteristics.iter().map(|c| c.uuid).collect();
                        (s.uuid, characteristics)
                    }));
                    TransportEvent::ServicesDiscovered {
                        status: GattStatus::Success,
                        catalog,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "service discovery failed");
                    TransportEvent::ServicesDiscovered {
                        status: GattStatus::Failure(GATT_INTERNAL_ERROR),
                        catalog: ServiceCatalog::default(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }

    fn write_characteristic(&mut self, service: Uuid, characteristic: Uuid, value: &[u8]) {
        let events = self.events.clone();
        let peripheral = self.current_peripheral();
        let value = value.to_vec();

        tokio::spawn(async move {
            let status = match &peripheral {
                Some(p) => match find_characteristic(p, service, characteristic) {
                    // The peripheral acks config and serial writes, so ask
                    // for a response to drive the sequencer.
                    Some(target) => match p.write(&target, &value, WriteType::WithResponse).await {
                        Ok(()) => GattStatus::Success,
                        Err(e) => {
                            warn!(error = %e, %characteristic, "characteristic write failed");
                            GattStatus::Failure(GATT_INTERNAL_ERROR)
                        }
                    },
                    None => GattStatus::Failure(GATT_ATTR_NOT_FOUND),
                },
                None => GattStatus::Failure(GATT_ATTR_NOT_FOUND),
            };

            let _ = events.send(TransportEvent::CharacteristicWrite {
                characteristic,
                status,
            });
        });
    }

    fn write_descriptor(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) {
        if descriptor != CLIENT_CONFIG_DESCRIPTOR {
            warn!(%descriptor, "only the client config descriptor is supported");
            self.emit(TransportEvent::DescriptorWrite {
                characteristic,
                status: GattStatus::Failure(GATT_ATTR_NOT_FOUND),
            });
            return;
        }

        let events = self.events.clone();
        let peripheral = self.current_peripheral();
        let enable = value == ENABLE_NOTIFICATION_VALUE.as_slice();

        tokio::spawn(async move {
            let status = match &peripheral {
                Some(p) => match find_characteristic(p, service, characteristic) {
                    Some(target) => {
                        let result = if enable {
                            p.subscribe(&target).await
                        } else {
                            p.unsubscribe(&target).await
                        };
                        match result {
                            Ok(()) => GattStatus::Success,
                            Err(e) => {
                                warn!(error = %e, %characteristic, "CCCD write failed");
                                GattStatus::Failure(GATT_INTERNAL_ERROR)
                            }
                        }
                    }
                    None => GattStatus::Failure(GATT_ATTR_NOT_FOUND),
                },
                None => GattStatus::Failure(GATT_ATTR_NOT_FOUND),
            };

            let _ = events.send(TransportEvent::DescriptorWrite {
                characteristic,
                status,
            });
        });
    }

    fn read_characteristic(&mut self, service: Uuid, characteristic: Uuid) {
        let events = self.events.clone();
        let peripheral = self.current_peripheral();

        tokio::spawn(async move {
            let (status, value) = match &peripheral {
                Some(p) => match find_characteristic(p, service, characteristic) {
                    Some(target) => match p.read(&target).await {
                        Ok(value) => (GattStatus::Success, value),
                        Err(e) => {
                            warn!(error = %e, %characteristic, "characteristic read failed");
                            (GattStatus::Failure(GATT_INTERNAL_ERROR), Vec::new())
                        }
                    },
                    None => (GattStatus::Failure(GATT_ATTR_NOT_FOUND), Vec::new()),
                },
                None => (GattStatus::Failure(GATT_ATTR_NOT_FOUND), Vec::new()),
            };

            let _ = events.send(TransportEvent::CharacteristicRead {
                characteristic,
                status,
                value,
            });
        });
    }

    fn set_characteristic_notification(
        &mut self,
        _service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) {
        // btleplug arms delivery as part of the CCCD subscribe; nothing
        // separate to do locally.
        debug!(%characteristic, enable, "local notification flag folded into CCCD write");
    }
}
