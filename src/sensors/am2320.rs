//! AM2320 in I2C mode: wake, function-03 read, Modbus CRC16.
//!
//! The part sleeps between transactions and NACKs the first address it
//! hears, so every exchange starts with a throwaway wake write.

use crate::hal::Platform;
use crate::interfaces::i2c;
use crate::sensors::{PollStatus, Readings};

/// Read 4 registers starting at 0: humidity then temperature.
const CMD_READ: [u8; 3] = [0x03, 0x00, 0x04];

/// Modbus CRC16: polynomial 0xA001, seed 0xFFFF, transmitted LSB first.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &b in data {
        crc ^= u16::from(b);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = crc >> 1 ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

pub fn read(p: &dyn Platform, addr: u8, readings: &mut Readings) -> PollStatus {
    // Wake; the reply (if any) is irrelevant.
    let _ = i2c::write_raw(p, addr, &[]);
    if !i2c::write_raw(p, addr, &CMD_READ) {
        return PollStatus::Timeout;
    }
    // Datasheet: at least 1.5 ms before collecting the reply.
    p.delay_ms(2);
    let mut buf = [0u8; 8];
    if !i2c::read_raw(p, addr, &mut buf) {
        return PollStatus::Timeout;
    }
    if buf[0] != CMD_READ[0] || buf[1] != CMD_READ[2] {
        return PollStatus::Error;
    }
    if crc16(&buf[..6]) != u16::from_le_bytes([buf[6], buf[7]]) {
        return PollStatus::BadCrc;
    }
    readings.hum = f32::from(u16::from_be_bytes([buf[2], buf[3]])) / 10.0;
    let raw = u16::from_be_bytes([buf[4], buf[5]]);
    let mut temp = f32::from(raw & 0x7FFF) / 10.0;
    if raw & 0x8000 != 0 {
        temp = -temp;
    }
    readings.temp = temp;
    PollStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockPlatform;

    fn frame(hum_tenths: u16, raw_temp: u16) -> [u8; 8] {
        let mut f = [0u8; 8];
        f[0] = 0x03;
        f[1] = 0x04;
        f[2..4].copy_from_slice(&hum_tenths.to_be_bytes());
        f[4..6].copy_from_slice(&raw_temp.to_be_bytes());
        let crc = crc16(&f[..6]);
        f[6..8].copy_from_slice(&crc.to_le_bytes());
        f
    }

    #[test]
    fn decodes_valid_frame() {
        let p = MockPlatform::new();
        p.script_i2c_read(Some(&frame(481, 253)));
        let mut r = Readings::default();
        assert_eq!(read(&p, 0xB8, &mut r), PollStatus::Ok);
        assert!((r.hum - 48.1).abs() < 1e-3);
        assert!((r.temp - 25.3).abs() < 1e-3);
    }

    #[test]
    fn sign_magnitude_temperature() {
        let p = MockPlatform::new();
        p.script_i2c_read(Some(&frame(300, 0x8000 | 105)));
        let mut r = Readings::default();
        assert_eq!(read(&p, 0xB8, &mut r), PollStatus::Ok);
        assert!((r.temp - -10.5).abs() < 1e-3);
    }

    #[test]
    fn corrupt_crc_is_flagged() {
        let p = MockPlatform::new();
        let mut f = frame(481, 253);
        f[3] ^= 0x01;
        p.script_i2c_read(Some(&f));
        let mut r = Readings::default();
        assert_eq!(read(&p, 0xB8, &mut r), PollStatus::BadCrc);
    }

    #[test]
    fn known_crc16_vector() {
        // Modbus check value for "123456789".
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }
}
