//! Station service: the single task that drives a session.
//!
//! The transport delivers every completion on one channel and collaborators
//! submit commands on another; both are drained here, one at a time, which
//! is what serializes all session mutation without locks.

use crate::domain::bus::ReadingBus;
use crate::domain::models::PeripheralAddress;
use crate::infrastructure::bluetooth::session::SensorSession;
use crate::infrastructure::bluetooth::transport::{GattTransport, TransportEvent};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Commands collaborators can submit to the running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Connect(PeripheralAddress),
    Disconnect,
    /// Write bytes to the serial tunnel characteristic.
    SendSerial(Vec<u8>),
    /// Tear down and stop the service task.
    Close,
}

/// Owns a [`SensorSession`] and drives it from a command channel plus the
/// transport's event channel.
pub struct StationService<T: GattTransport> {
    session: SensorSession<T>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T: GattTransport> StationService<T> {
    /// Build the service and the command sender collaborators hold on to.
    /// Subscribe to `bus` before calling this; the bus moves into the
    /// session.
    pub fn new(
        transport: T,
        bus: ReadingBus,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (Self, mpsc::UnboundedSender<SessionCommand>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let service = Self {
            session: SensorSession::new(transport, bus),
            commands,
            transport_events,
        };
        (service, command_tx)
    }

    /// Run until `Close` arrives or both channels shut down.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Connect(address)) => {
                        if let Err(e) = self.session.connect(&address) {
                            error!(error = %e, %address, "connection attempt rejected");
                        }
                    }
                    Some(SessionCommand::Disconnect) => self.session.disconnect(),
                    Some(SessionCommand::SendSerial(data)) => {
                        if let Err(e) = self.session.send_serial(&data) {
                            warn!(error = %e, "serial write rejected");
                        }
                    }
                    Some(SessionCommand::Close) | None => {
                        self.session.disconnect();
                        self.session.close();
                        info!("station service stopped");
                        break;
                    }
                },
                event = self.transport_events.recv() => match event {
                    Some(event) => self.session.handle_transport_event(event),
                    None => {
                        warn!("transport event channel closed, stopping");
                        self.session.close();
                        break;
                    }
                },
            }
        }
    }
}
