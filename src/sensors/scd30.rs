//! Sensirion SCD30 CO₂ module: command-framed I2C with a per-word CRC8
//! and big-endian float payloads.
//!
//! The module measures continuously on its own cadence; a poll first
//! asks "data ready" and reports [`PollStatus::Polling`] until the next
//! triplet is available.

use crate::hal::Platform;
use crate::interfaces::i2c;
use crate::sensors::{PollStatus, Readings};

const CMD_START_CONTINUOUS: u16 = 0x0010;
const CMD_STOP_CONTINUOUS: u16 = 0x0104;
const CMD_DATA_READY: u16 = 0x0202;
const CMD_READ_MEASUREMENT: u16 = 0x0300;

/// Sensirion CRC8: polynomial 0x31, seed 0xFF, MSB first, over each
/// 2-byte word.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xFFu8;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = crc << 1 ^ 0x31;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn send_command(p: &dyn Platform, addr: u8, cmd: u16) -> bool {
    i2c::write_raw(p, addr, &cmd.to_be_bytes())
}

fn send_command_arg(p: &dyn Platform, addr: u8, cmd: u16, arg: u16) -> bool {
    let c = cmd.to_be_bytes();
    let a = arg.to_be_bytes();
    i2c::write_raw(p, addr, &[c[0], c[1], a[0], a[1], crc8(&a)])
}

/// Start continuous measurement with ambient-pressure compensation off.
pub fn start_continuous(p: &dyn Platform, addr: u8) -> bool {
    send_command_arg(p, addr, CMD_START_CONTINUOUS, 0)
}

pub fn stop_continuous(p: &dyn Platform, addr: u8) -> bool {
    send_command(p, addr, CMD_STOP_CONTINUOUS)
}

/// A CRC-checked big-endian float from one 6-byte field (two words, each
/// with its own CRC).
fn field_f32(raw: &[u8]) -> Option<f32> {
    if crc8(&raw[0..2]) != raw[2] || crc8(&raw[3..5]) != raw[5] {
        return None;
    }
    Some(f32::from_bits(u32::from_be_bytes([
        raw[0], raw[1], raw[3], raw[4],
    ])))
}

pub fn read(p: &dyn Platform, addr: u8, readings: &mut Readings) -> PollStatus {
    if !send_command(p, addr, CMD_DATA_READY) {
        return PollStatus::Timeout;
    }
    let mut ready = [0u8; 3];
    if !i2c::read_raw(p, addr, &mut ready) {
        return PollStatus::Timeout;
    }
    if u16::from_be_bytes([ready[0], ready[1]]) != 1 {
        return PollStatus::Polling;
    }

    if !send_command(p, addr, CMD_READ_MEASUREMENT) {
        return PollStatus::Timeout;
    }
    let mut buf = [0u8; 18];
    if !i2c::read_raw(p, addr, &mut buf) {
        return PollStatus::Timeout;
    }
    let (Some(co2), Some(temp), Some(hum)) = (
        field_f32(&buf[0..6]),
        field_f32(&buf[6..12]),
        field_f32(&buf[12..18]),
    ) else {
        return PollStatus::BadCrc;
    };
    readings.co2 = co2;
    readings.temp = temp;
    readings.hum = hum;
    PollStatus::Ok
}
