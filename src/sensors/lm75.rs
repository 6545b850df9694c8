//! LM75 digital thermometer: one big-endian 9-bit reading in register 0.

use crate::hal::Platform;
use crate::interfaces::i2c;
use crate::sensors::{PollStatus, Readings};

const REG_TEMP: u8 = 0x00;

pub fn read(p: &dyn Platform, addr: u8, readings: &mut Readings) -> PollStatus {
    let mut buf = [0u8; 2];
    if !i2c::read_regs(p, addr, REG_TEMP, &mut buf) {
        return PollStatus::Timeout;
    }
    readings.temp = f32::from(i16::from_be_bytes(buf)) / 256.0;
    PollStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockPlatform;

    #[test]
    fn positive_half_degree() {
        let p = MockPlatform::new();
        p.script_i2c_write(true);
        p.script_i2c_read(Some(&[0x1A, 0x80]));
        let mut r = Readings::default();
        assert_eq!(read(&p, 0x90, &mut r), PollStatus::Ok);
        assert!((r.temp - 26.5).abs() < 1e-3);
    }

    #[test]
    fn negative_reading() {
        let p = MockPlatform::new();
        p.script_i2c_write(true);
        p.script_i2c_read(Some(&[0xE7, 0x00]));
        let mut r = Readings::default();
        assert_eq!(read(&p, 0x90, &mut r), PollStatus::Ok);
        assert!((r.temp - -25.0).abs() < 1e-3);
    }

    #[test]
    fn absent_device_times_out() {
        let p = MockPlatform::new();
        let mut r = Readings::default();
        assert_eq!(read(&p, 0x90, &mut r), PollStatus::Timeout);
        assert_eq!(r.temp, crate::sensors::NO_DATA);
    }
}
