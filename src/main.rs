//! Hardware monitor: connect to a station and log its readings.
//!
//! Usage: `weathertag AA:BB:CC:DD:EE:FF` (falls back to the last-used
//! address from settings).

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use weathertag::infrastructure::logging;
use weathertag::{
    BtleplugTransport, PeripheralAddress, ReadingBus, SensorReading, SessionCommand, SessionEvent,
    SettingsService, StationService, PRESSURE_RAW_TO_IN_HG,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = SettingsService::new()?;
    let _log_guard = logging::init_logger(&settings.get().log_settings)?;

    let address: PeripheralAddress = std::env::args()
        .nth(1)
        .or_else(|| settings.get().last_device_address.clone())
        .context("usage: weathertag <AA:BB:CC:DD:EE:FF>")?
        .parse()?;
    settings.remember_address(&address)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let transport = BtleplugTransport::new(event_tx);

    let mut bus = ReadingBus::new();
    let (_subscriber, mut events) = bus.subscribe();

    let (service, commands) = StationService::new(transport, bus, event_rx);
    let driver = tokio::spawn(service.run());

    commands.send(SessionCommand::Connect(address))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::Reading(reading)) => log_reading(&reading),
                Some(SessionEvent::Connected) => info!("link up"),
                Some(SessionEvent::ServicesDiscovered) => info!("services discovered"),
                Some(SessionEvent::DecodeError(e)) => info!(error = %e, "payload dropped"),
                Some(SessionEvent::Disconnected) => {
                    info!("link down, exiting");
                    break;
                }
                None => break,
            },
        }
    }

    let _ = commands.send(SessionCommand::Close);
    driver.await.ok();
    Ok(())
}

fn log_reading(reading: &SensorReading) {
    match reading {
        SensorReading::Pressure(raw) => {
            info!(in_hg = raw * PRESSURE_RAW_TO_IN_HG, "pressure");
        }
        SensorReading::Temperature(fahrenheit) => info!(fahrenheit = *fahrenheit, "temperature"),
        SensorReading::Humidity(percent) => info!(percent = *percent, "humidity"),
        SensorReading::RawSerial(text) => info!(%text, "serial"),
    }
}
