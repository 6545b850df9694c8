//! SPI engine: shared clock/data lines, per-sensor chip-select framing.
//!
//! The engine owns nothing but the chip-select pin; the three shared
//! lines belong to the platform adapter and are reference-counted in the
//! registry. A transfer is select, clock the frame in, deselect — the
//! supported devices are read-only.

use crate::gpio::Port;
use crate::hal::{PinMode, PinPull, Platform};
use crate::interfaces::i2c::BUS_TIMEOUT_MS;
use crate::sensors::{max318x5, PollStatus, Readings, SensorModel};

/// Chip-select idles high (deselected).
pub fn init(p: &dyn Platform, cs: &Port) {
    p.pin_init(cs.pin, PinMode::OutputPushPull, PinPull::Up);
    p.pin_write(cs.pin, true);
}

pub fn deinit(p: &dyn Platform, cs: &Port) {
    p.pin_init(cs.pin, PinMode::Analog, PinPull::None);
}

/// One framed read: the device streams its whole frame while selected.
pub fn read_frame(p: &dyn Platform, cs: &Port, buf: &mut [u8]) -> bool {
    p.spi_acquire();
    p.pin_write(cs.pin, false);
    let ok = p.spi_read(buf, BUS_TIMEOUT_MS);
    p.pin_write(cs.pin, true);
    p.spi_release();
    ok
}

pub fn update(
    p: &dyn Platform,
    cs: &Port,
    model: SensorModel,
    readings: &mut Readings,
) -> PollStatus {
    match model {
        SensorModel::Max6675 => max318x5::read_max6675(p, cs, readings),
        SensorModel::Max31855 => max318x5::read_max31855(p, cs, readings),
        _ => PollStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::DEFAULT_BOARD;
    use crate::hal::mock::MockPlatform;

    fn cs() -> &'static Port {
        &DEFAULT_BOARD.ports[2]
    }

    #[test]
    fn frame_is_bracketed_by_chip_select() {
        let p = MockPlatform::new();
        init(&p, cs());
        p.script_spi_read(Some(&[0x01, 0x90]));
        let mut buf = [0u8; 2];
        assert!(read_frame(&p, cs(), &mut buf));
        assert_eq!(buf, [0x01, 0x90]);
        assert_eq!(
            p.pin_writes(),
            vec![(cs().pin, true), (cs().pin, false), (cs().pin, true)]
        );
        assert_eq!(p.spi_acquires(), 1);
    }

    #[test]
    fn timeout_still_deselects() {
        let p = MockPlatform::new();
        let mut buf = [0u8; 2];
        assert!(!read_frame(&p, cs(), &mut buf));
        assert_eq!(p.pin_writes().last(), Some(&(cs().pin, true)));
    }
}
