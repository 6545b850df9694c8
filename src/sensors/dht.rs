//! Frame decoding for the DHT family (and single-wire AM2320).
//!
//! Two wire formats share the 40-bit frame:
//!
//! - integer devices (DHT11/DHT12): whole degrees/percent in byte 0 and
//!   byte 2, tenths in the following byte, sign in bit 7 of byte 3;
//! - fixed-point devices (DHT21/DHT22/AM2320): big-endian tenths, with
//!   the temperature sign nominally sign-magnitude in bit 15. Widespread
//!   clone chips emit two's complement instead; a set bit 14 alongside
//!   bit 15 cannot occur in the sign-magnitude range these parts cover,
//!   so it selects the two's-complement reading.

use super::SensorModel;

/// Decode a checksummed 40-bit frame into `(temperature °C, humidity %)`.
/// `None` for models this bus does not carry.
pub fn decode(model: SensorModel, frame: &[u8; 5]) -> Option<(f32, f32)> {
    match model {
        SensorModel::Dht11 | SensorModel::Dht12 => Some(decode_integer(frame)),
        SensorModel::Dht21 | SensorModel::Dht22 | SensorModel::Am2320Sw => {
            Some(decode_fixed_point(frame))
        }
        _ => None,
    }
}

fn decode_integer(frame: &[u8; 5]) -> (f32, f32) {
    let hum = f32::from(frame[0]) + f32::from(frame[1]) * 0.1;
    let mut temp = f32::from(frame[2]) + f32::from(frame[3] & 0x7F) * 0.1;
    if frame[3] & 0x80 != 0 {
        temp = -temp;
    }
    (temp, hum)
}

fn decode_fixed_point(frame: &[u8; 5]) -> (f32, f32) {
    let hum = f32::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let raw = u16::from_be_bytes([frame[2], frame[3]]);
    let temp = if raw & 0x8000 != 0 {
        if raw & 0x4000 != 0 {
            // Two's-complement clone.
            f32::from(raw as i16) / 10.0
        } else {
            -f32::from(raw & 0x7FFF) / 10.0
        }
    } else {
        f32::from(raw) / 10.0
    };
    (temp, hum)
}
