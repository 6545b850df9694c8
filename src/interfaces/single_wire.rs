//! Timing-critical single-wire engine (DHT-style proprietary protocol).
//!
//! One dedicated open-drain pin per sensor. A poll is one blocking
//! exchange: hold the line low long enough to wake the device, release
//! it, then sample the 40-bit reply by comparing low/high phase lengths
//! per bit. The sampling window runs inside a critical section so
//! preemption cannot stretch a phase; every busy-wait is bounded, so the
//! section always exits.

use crate::hal::{PinId, PinMode, PinPull, Platform};
use crate::gpio::Port;
use crate::sensors::{dht, PollStatus, Readings, SensorModel};

/// Wake-up pulse width. Generous enough for the slowest DHT11.
const START_LOW_MS: u32 = 19;

/// Poll budget per level wait. Exhausting it means the device never
/// produced the expected edge.
const WAIT_BUDGET: u32 = 10_000;

/// Configure the data pin: open-drain, pulled up, released high.
pub fn init(p: &dyn Platform, port: &Port) {
    p.pin_init(port.pin, PinMode::OutputOpenDrain, PinPull::Up);
    p.pin_write(port.pin, true);
}

/// Return the pin to its high-impedance reset state.
pub fn deinit(p: &dyn Platform, port: &Port) {
    p.pin_init(port.pin, PinMode::Analog, PinPull::None);
}

/// Count polls until the line reads `level`. `None` when the edge never
/// arrives within the budget.
fn wait_level(p: &dyn Platform, pin: PinId, level: bool) -> Option<u32> {
    for i in 0..WAIT_BUDGET {
        if p.pin_read(pin) == level {
            return Some(i);
        }
    }
    None
}

/// One full exchange: wake pulse, handshake, 40 data bits MSB-first.
fn transfer(p: &dyn Platform, port: &Port) -> Option<[u8; 5]> {
    p.pin_write(port.pin, false);
    p.delay_ms(START_LOW_MS);
    p.pin_write(port.pin, true);

    critical_section::with(|_| {
        // Release edge, response low, response high, first bit start.
        for level in [true, false, true, false] {
            wait_level(p, port.pin, level)?;
        }
        let mut data = [0u8; 5];
        for i in 0..40 {
            let low = wait_level(p, port.pin, true)?;
            let high = wait_level(p, port.pin, false)?;
            data[i / 8] <<= 1;
            if high > low {
                data[i / 8] |= 1;
            }
        }
        Some(data)
    })
}

/// Poll a single-wire sensor once and store fresh readings on success.
pub fn update(
    p: &dyn Platform,
    port: &Port,
    model: SensorModel,
    readings: &mut Readings,
) -> PollStatus {
    let Some(frame) = transfer(p, port) else {
        return PollStatus::Timeout;
    };
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return PollStatus::BadCrc;
    }
    match dht::decode(model, &frame) {
        Some((temp, hum)) => {
            readings.temp = temp;
            readings.hum = hum;
            PollStatus::Ok
        }
        None => PollStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::DEFAULT_BOARD;
    use crate::hal::mock::MockPlatform;

    fn port() -> &'static Port {
        &DEFAULT_BOARD.ports[0]
    }

    /// Script a full reply waveform: handshake then 40 bits where a long
    /// high phase encodes a one.
    fn script_frame(p: &MockPlatform, pin: PinId, data: [u8; 5]) {
        let mut s = vec![true, false, true, false];
        for byte in data {
            for i in (0..8).rev() {
                if byte >> i & 1 == 1 {
                    s.extend([false, true, true, true, false]);
                } else {
                    s.extend([false, true, false]);
                }
            }
        }
        p.script_pin(pin, &s);
    }

    fn checksummed(mut data: [u8; 5]) -> [u8; 5] {
        data[4] = data[..4].iter().fold(0u8, |a, b| a.wrapping_add(*b));
        data
    }

    #[test]
    fn decodes_scripted_reply() {
        let p = MockPlatform::new();
        let frame = checksummed([0x02, 0x8C, 0x01, 0x5F, 0]);
        script_frame(&p, port().pin, frame);
        let mut r = Readings::default();
        let status = update(&p, port(), SensorModel::Dht22, &mut r);
        assert_eq!(status, PollStatus::Ok);
        assert!((r.hum - 65.2).abs() < 1e-3);
        assert!((r.temp - 35.1).abs() < 1e-3);
        assert_eq!(p.pin_script_remaining(port().pin), 0);
    }

    #[test]
    fn silent_line_times_out() {
        let p = MockPlatform::new();
        let mut r = Readings::default();
        let status = update(&p, port(), SensorModel::Dht22, &mut r);
        assert_eq!(status, PollStatus::Timeout);
        // No data stored on failure.
        assert_eq!(r, Readings::default());
    }

    #[test]
    fn corrupt_checksum_is_flagged() {
        let p = MockPlatform::new();
        let mut frame = checksummed([0x02, 0x8C, 0x01, 0x5F, 0]);
        frame[4] ^= 0x01;
        script_frame(&p, port().pin, frame);
        let mut r = Readings::default();
        assert_eq!(
            update(&p, port(), SensorModel::Dht22, &mut r),
            PollStatus::BadCrc
        );
        assert_eq!(r, Readings::default());
    }

    #[test]
    fn start_pulse_drives_then_releases() {
        let p = MockPlatform::new();
        init(&p, port());
        let _ = transfer(&p, port());
        let writes = p.pin_writes();
        // init high, start low, release high.
        assert_eq!(
            writes,
            vec![(port().pin, true), (port().pin, false), (port().pin, true)]
        );
        assert_eq!(
            p.pin_mode(port().pin),
            Some((PinMode::OutputOpenDrain, PinPull::Up))
        );
    }
}
