//! Error types shared across the session driver.

use crate::infrastructure::bluetooth::transport::GattStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the session driver.
///
/// Transport-level failures (`ConnectFailed`, `DiscoveryFailed`,
/// `OperationFailed`) are not retried: they force the link to
/// `Disconnected` and reset all session state. Decode failures are local
/// and leave the link untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport could not start a connection attempt.
    #[error("transport could not establish a link")]
    ConnectFailed,

    /// Service discovery completed with a non-success status.
    #[error("service discovery failed ({0})")]
    DiscoveryFailed(GattStatus),

    /// A characteristic/descriptor write or read reported non-success.
    #[error("GATT operation failed ({0})")]
    OperationFailed(GattStatus),

    /// An operation that requires an established link was requested while
    /// the link was down.
    #[error("link is not connected")]
    NotConnected,

    /// The connected peripheral does not expose the required characteristic.
    #[error("characteristic {0} not present on the peripheral")]
    MissingCharacteristic(Uuid),

    /// A payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A malformed sensor payload. Always recoverable: the payload is dropped,
/// a `DecodeError` event is published, and the session continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is shorter than the decoder requires.
    #[error("payload too short: got {actual} bytes, need {expected}")]
    ShortPayload { expected: usize, actual: usize },

    /// A pressure payload arrived before the calibration characteristic
    /// was read. Decoding without coefficients would produce garbage, so
    /// the payload is dropped instead.
    #[error("pressure payload received before calibration")]
    MissingCalibration,
}
