//! MAX6675 / MAX31855 thermocouple converters (SPI, read-only frames).

use crate::gpio::Port;
use crate::hal::Platform;
use crate::interfaces::spi;
use crate::sensors::{PollStatus, Readings};

/// MAX6675 16-bit frame: bit 2 flags an open thermocouple, bits 14..3
/// carry the temperature in 0.25 °C steps.
pub fn decode_max6675(raw: u16) -> Result<f32, PollStatus> {
    if raw & 0x0004 != 0 {
        return Err(PollStatus::Timeout);
    }
    Ok(f32::from(raw >> 3 & 0x0FFF) * 0.25)
}

/// MAX31855 32-bit frame: bit 16 flags a fault, with the kind in the low
/// bits (bit 0 = open circuit); the signed 14-bit temperature sits in
/// bits 31..18 at 0.25 °C per step.
pub fn decode_max31855(raw: u32) -> Result<f32, PollStatus> {
    if raw & 0x0001_0000 != 0 {
        if raw & 0x0001 != 0 {
            return Err(PollStatus::Timeout);
        }
        return Err(PollStatus::Error);
    }
    Ok((raw as i32 >> 18) as f32 * 0.25)
}

pub fn read_max6675(p: &dyn Platform, cs: &Port, readings: &mut Readings) -> PollStatus {
    let mut buf = [0u8; 2];
    if !spi::read_frame(p, cs, &mut buf) {
        return PollStatus::Timeout;
    }
    match decode_max6675(u16::from_be_bytes(buf)) {
        Ok(t) => {
            readings.temp = t;
            PollStatus::Ok
        }
        Err(status) => status,
    }
}

pub fn read_max31855(p: &dyn Platform, cs: &Port, readings: &mut Readings) -> PollStatus {
    let mut buf = [0u8; 4];
    if !spi::read_frame(p, cs, &mut buf) {
        return PollStatus::Timeout;
    }
    match decode_max31855(u32::from_be_bytes(buf)) {
        Ok(t) => {
            readings.temp = t;
            PollStatus::Ok
        }
        Err(status) => status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::DEFAULT_BOARD;
    use crate::hal::mock::MockPlatform;

    #[test]
    fn max6675_quarter_degrees() {
        // 100.0 °C = 400 steps.
        assert_eq!(decode_max6675(400 << 3), Ok(100.0));
        assert_eq!(decode_max6675(0x0004), Err(PollStatus::Timeout));
    }

    #[test]
    fn max31855_signed_temperature() {
        // +25.0 °C = 100 steps; -0.25 °C = -1 step.
        assert_eq!(decode_max31855(100u32 << 18), Ok(25.0));
        assert_eq!(decode_max31855((-1i32 << 18) as u32), Ok(-0.25));
    }

    #[test]
    fn max31855_fault_kinds() {
        // Open circuit reads as a disconnect, anything else as a fault.
        assert_eq!(
            decode_max31855(0x0001_0001),
            Err(PollStatus::Timeout)
        );
        assert_eq!(decode_max31855(0x0001_0004), Err(PollStatus::Error));
    }

    #[test]
    fn framed_read_updates_temperature() {
        let p = MockPlatform::new();
        let cs = &DEFAULT_BOARD.ports[2];
        p.script_spi_read(Some(&(400u16 << 3).to_be_bytes()));
        let mut r = Readings::default();
        assert_eq!(read_max6675(&p, cs, &mut r), PollStatus::Ok);
        assert_eq!(r.temp, 100.0);
    }
}
