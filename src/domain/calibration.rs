//! Barometric pressure calibration.
//!
//! The pressure sensor ships eight factory coefficients that must be read
//! from its calibration characteristic once per connection before any raw
//! pressure sample can be converted.

use crate::error::DecodeError;

/// Byte length of the calibration characteristic payload.
pub const CALIBRATION_LEN: usize = 16;

/// The eight unsigned 16-bit calibration coefficients, read little-endian
/// at byte offsets 0, 2, 4, ..., 14.
///
/// Held for the lifetime of one connection and cleared on disconnect; a
/// pressure payload that arrives without a stored calibration is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaroCalibration {
    coefficients: [u16; 8],
}

impl BaroCalibration {
    /// Extract the coefficient vector from the calibration payload.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < CALIBRATION_LEN {
            return Err(DecodeError::ShortPayload {
                expected: CALIBRATION_LEN,
                actual: payload.len(),
            });
        }

        let mut coefficients = [0u16; 8];
        for (i, c) in coefficients.iter_mut().enumerate() {
            *c = u16::from_le_bytes([payload[2 * i], payload[2 * i + 1]]);
        }

        Ok(Self { coefficients })
    }

    #[cfg(test)]
    pub fn from_coefficients(coefficients: [u16; 8]) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[u16; 8] {
        &self.coefficients
    }

    /// Convert a raw pressure sample to the sensor's native pressure unit.
    ///
    /// Second-order sensitivity/offset compensation, evaluated in `f64`
    /// with this exact operation order (c = coefficients, t = raw
    /// temperature, p = raw pressure):
    ///
    /// ```text
    /// S = c2 + c3*t/2^17 + ((c4*t/2^15)*t)/2^19
    /// O = c5*2^14 + c6*t/2^3 + ((c7*t/2^15)*t)/2^4
    /// pressure = (S*p + O)/2^14
    /// ```
    pub fn compensate(&self, t_raw: i16, p_raw: u16) -> f64 {
        let c = &self.coefficients;
        let t = f64::from(t_raw);
        let p = f64::from(p_raw);

        let s = f64::from(c[2])
            + f64::from(c[3]) * t / 2f64.powi(17)
            + ((f64::from(c[4]) * t / 2f64.powi(15)) * t) / 2f64.powi(19);
        let o = f64::from(c[5]) * 2f64.powi(14)
            + f64::from(c[6]) * t / 2f64.powi(3)
            + ((f64::from(c[7]) * t / 2f64.powi(15)) * t) / 2f64.powi(4);

        (s * p + o) / 2f64.powi(14)
    }
}
