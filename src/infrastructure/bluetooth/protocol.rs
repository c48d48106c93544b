//! Weather station GATT protocol
//!
//! Service/characteristic identifiers, the fixed sensor activation table,
//! and the payload decoders. The identifiers are part of the wire contract
//! with the peripheral firmware and must match exactly.

use crate::domain::calibration::BaroCalibration;
use crate::error::DecodeError;
use uuid::Uuid;

// Barometric pressure (custom 128-bit base)
pub const PRESSURE_SERVICE: Uuid = Uuid::from_u128(0xf000aa40_0451_4000_b000_000000000000);
pub const PRESSURE_DATA_CHAR: Uuid = Uuid::from_u128(0xf000aa41_0451_4000_b000_000000000000);
pub const PRESSURE_CONFIG_CHAR: Uuid = Uuid::from_u128(0xf000aa42_0451_4000_b000_000000000000);
pub const PRESSURE_CAL_CHAR: Uuid = Uuid::from_u128(0xf000aa43_0451_4000_b000_000000000000);

// Humidity (custom 128-bit base)
pub const HUMIDITY_SERVICE: Uuid = Uuid::from_u128(0xf000aa20_0451_4000_b000_000000000000);
pub const HUMIDITY_DATA_CHAR: Uuid = Uuid::from_u128(0xf000aa21_0451_4000_b000_000000000000);
pub const HUMIDITY_CONFIG_CHAR: Uuid = Uuid::from_u128(0xf000aa22_0451_4000_b000_000000000000);

// Serial tunnel (standard 16-bit identifiers on the Bluetooth base)
pub const SERIAL_SERVICE: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);
pub const SERIAL_CHAR: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Client characteristic configuration descriptor (CCCD).
pub const CLIENT_CONFIG_DESCRIPTOR: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Standard "enable notification" value written to the CCCD.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Config byte that makes the pressure sensor expose its calibration.
pub const CALIBRATION_ENABLE: u8 = 0x02;
/// Config byte that starts a sensor's measurement cycle.
pub const SENSOR_ENABLE: u8 = 0x01;

/// Minimum payload length for pressure and humidity samples.
const SENSOR_PAYLOAD_LEN: usize = 4;

/// One entry of the activation sequence: where to write the enable byte and
/// which characteristic then carries the values to arm and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorChannel {
    pub name: &'static str,
    pub service: Uuid,
    pub data_char: Uuid,
    pub config_char: Uuid,
    pub enable: u8,
}

/// The fixed activation order. The firmware only populates a characteristic
/// after its companion config byte is written, and the calibration must be
/// on hand before the first pressure sample, so this ordering is a protocol
/// contract rather than a convenience.
pub static ACTIVATION_SEQUENCE: [SensorChannel; 3] = [
    SensorChannel {
        name: "pressure-calibration",
        service: PRESSURE_SERVICE,
        data_char: PRESSURE_CAL_CHAR,
        config_char: PRESSURE_CONFIG_CHAR,
        enable: CALIBRATION_ENABLE,
    },
    SensorChannel {
        name: "pressure-data",
        service: PRESSURE_SERVICE,
        data_char: PRESSURE_DATA_CHAR,
        config_char: PRESSURE_CONFIG_CHAR,
        enable: SENSOR_ENABLE,
    },
    SensorChannel {
        name: "humidity-data",
        service: HUMIDITY_SERVICE,
        data_char: HUMIDITY_DATA_CHAR,
        config_char: HUMIDITY_CONFIG_CHAR,
        enable: SENSOR_ENABLE,
    },
];

/// Read an unsigned 16-bit field stored as `[low, high]`.
///
/// The sensors emit two's-complement 16-bit values LSB first, so a
/// big-endian read of the pair produces byte-swapped garbage; the value is
/// `(high << 8) | low`. Returns `None` when the buffer is short.
pub fn read_u16_le(payload: &[u8], offset: usize) -> Option<u16> {
    let bytes = payload.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a signed 16-bit field stored as `[low, high]`.
///
/// Same layout as [`read_u16_le`], with the sign taken from the high byte.
pub fn read_i16_le(payload: &[u8], offset: usize) -> Option<i16> {
    let bytes = payload.get(offset..offset + 2)?;
    Some(i16::from_le_bytes([bytes[0], bytes[1]]))
}

fn short_payload(payload: &[u8]) -> DecodeError {
    DecodeError::ShortPayload {
        expected: SENSOR_PAYLOAD_LEN,
        actual: payload.len(),
    }
}

/// Decode a raw pressure sample into the sensor's native pressure unit.
///
/// The payload carries the raw temperature (signed, offset 0) and raw
/// pressure (unsigned, offset 2); the conversion itself lives with the
/// calibration coefficients.
pub fn decode_pressure(payload: &[u8], calibration: &BaroCalibration) -> Result<f64, DecodeError> {
    let t_raw = read_i16_le(payload, 0).ok_or_else(|| short_payload(payload))?;
    let p_raw = read_u16_le(payload, 2).ok_or_else(|| short_payload(payload))?;

    Ok(calibration.compensate(t_raw, p_raw))
}

/// Decode a humidity sample into `(temperature °F, relative humidity %)`.
///
/// The humidity field packs two status bits into its low end, which are
/// stripped before scaling (datasheet framing).
pub fn decode_humidity(payload: &[u8]) -> Result<(f64, f64), DecodeError> {
    let t_raw = read_i16_le(payload, 0).ok_or_else(|| short_payload(payload))?;
    let h_raw = read_u16_le(payload, 2).ok_or_else(|| short_payload(payload))?;

    let temp_c = -46.85 + (175.72 / 65536.0) * f64::from(t_raw);
    let temp_f = temp_c * 9.0 / 5.0 + 32.0;

    let h_masked = h_raw - h_raw % 4;
    let humidity = -6.0 + 125.0 * (f64::from(h_masked) / 65535.0);

    Ok((temp_f, humidity))
}

/// Decode a serial tunnel payload as text. Empty payloads carry nothing
/// and produce no reading.
pub fn decode_raw_serial(payload: &[u8]) -> Option<String> {
    if payload.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(payload).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_low_byte_first() {
        let payload = [0x34, 0x12];
        assert_eq!(read_u16_le(&payload, 0), Some(0x1234));
        assert_eq!(read_i16_le(&payload, 0), Some(0x1234));
    }

    #[test]
    fn sign_comes_from_the_high_byte() {
        let payload = [0x00, 0x80];
        assert_eq!(read_i16_le(&payload, 0), Some(-32768));
        assert_eq!(read_u16_le(&payload, 0), Some(32768));

        let payload = [0xff, 0x7f];
        assert_eq!(read_i16_le(&payload, 0), Some(32767));
    }

    #[test]
    fn reads_past_the_end_are_none() {
        assert_eq!(read_u16_le(&[0x01], 0), None);
        assert_eq!(read_i16_le(&[0x01, 0x02, 0x03], 2), None);
    }

    #[test]
    fn humidity_reference_vector() {
        // t_raw = 0, h_raw = 40000 (already a multiple of 4).
        let payload = [0x00, 0x00, 0x40, 0x9c];
        let (temp_f, humidity) = decode_humidity(&payload).unwrap();

        // tempC = -46.85, tempF = -46.85 * 9/5 + 32
        assert!((temp_f - -52.33).abs() < 0.01);
        // humid = -6 + 125 * (40000 / 65535)
        assert!((humidity - 70.2857).abs() < 0.01);
    }

    #[test]
    fn humidity_strips_status_bits() {
        // 40003 masks down to 40000: the two low bits are status flags.
        let masked = decode_humidity(&[0x00, 0x00, 0x43, 0x9c]).unwrap();
        let clean = decode_humidity(&[0x00, 0x00, 0x40, 0x9c]).unwrap();
        assert_eq!(masked, clean);
    }

    #[test]
    fn humidity_is_pure() {
        let payload = [0x12, 0x80, 0x43, 0x9c];
        assert_eq!(
            decode_humidity(&payload).unwrap(),
            decode_humidity(&payload).unwrap()
        );
    }

    #[test]
    fn pressure_reference_vector() {
        let cal = BaroCalibration::from_coefficients([0, 0, 20000, 0, 0, 1, 0, 0]);
        // t_raw = 0 at offset 0, p_raw = 10000 at offset 2.
        let payload = [0x00, 0x00, 0x10, 0x27];

        let pressure = decode_pressure(&payload, &cal).unwrap();
        let expected = (20000.0 * 10000.0 + 16384.0) / 16384.0;
        assert!((pressure - expected).abs() < 1e-9);
    }

    #[test]
    fn short_buffers_fail_without_panicking() {
        let cal = BaroCalibration::from_coefficients([0; 8]);

        assert_eq!(
            decode_pressure(&[0x00], &cal).unwrap_err(),
            DecodeError::ShortPayload {
                expected: 4,
                actual: 1
            }
        );
        assert_eq!(
            decode_humidity(&[0x00]).unwrap_err(),
            DecodeError::ShortPayload {
                expected: 4,
                actual: 1
            }
        );
        // Three bytes hold a full first field but only half the second.
        assert!(decode_humidity(&[0x00, 0x00, 0x40]).is_err());
    }

    #[test]
    fn serial_payloads_decode_as_text() {
        assert_eq!(decode_raw_serial(b"ok 42"), Some("ok 42".to_string()));
        assert_eq!(decode_raw_serial(b""), None);
    }

    #[test]
    fn activation_sequence_is_calibration_pressure_humidity() {
        let names: Vec<&str> = ACTIVATION_SEQUENCE.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["pressure-calibration", "pressure-data", "humidity-data"]
        );
        assert_eq!(ACTIVATION_SEQUENCE[0].enable, 0x02);
        assert_eq!(ACTIVATION_SEQUENCE[1].enable, 0x01);
        assert_eq!(ACTIVATION_SEQUENCE[2].enable, 0x01);
    }
}
