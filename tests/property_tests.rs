//! Property-based checks for the wire-level validation primitives.

use proptest::prelude::*;

use polysense::gpio::DEFAULT_BOARD;
use polysense::hal::mock::MockPlatform;
use polysense::interfaces::one_wire::crc8;
use polysense::interfaces::single_wire;
use polysense::sensors::{am2320, scd30, Readings, SensorModel};
use polysense::PollStatus;

/// Replay a 40-bit reply waveform for the single-wire engine.
fn script_dht(p: &MockPlatform, pin: u8, data: [u8; 5]) {
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

proptest! {
    #[test]
    fn onewire_crc_checks_to_zero_and_detects_any_bit_flip(
        data in any::<[u8; 8]>(),
        bit in 0..72usize,
    ) {
        let mut frame = [0u8; 9];
        frame[..8].copy_from_slice(&data);
        frame[8] = crc8(&frame[..8]);
        prop_assert_eq!(crc8(&frame), 0);
        frame[bit / 8] ^= 1 << (bit % 8);
        prop_assert_ne!(crc8(&frame), 0);
    }

    #[test]
    fn modbus_crc_with_trailer_checks_to_zero(
        data in prop::collection::vec(any::<u8>(), 1..16),
    ) {
        let crc = am2320::crc16(&data);
        let mut framed = data;
        framed.extend_from_slice(&crc.to_le_bytes());
        prop_assert_eq!(am2320::crc16(&framed), 0);
    }

    #[test]
    fn sensirion_word_crc_with_trailer_checks_to_zero(word in any::<[u8; 2]>()) {
        let crc = scd30::crc8(&word);
        prop_assert_eq!(scd30::crc8(&[word[0], word[1], crc]), 0);
    }

    #[test]
    fn single_wire_checksum_accepts_valid_and_rejects_corrupt(
        data in any::<[u8; 4]>(),
        corrupt in 0..5usize,
        delta in 1..=255u8,
    ) {
        let port = &DEFAULT_BOARD.ports[0];
        let sum = data.iter().fold(0u8, |a, b| a.wrapping_add(*b));
        let good = [data[0], data[1], data[2], data[3], sum];

        let p = MockPlatform::new();
        script_dht(&p, port.pin, good);
        let mut r = Readings::default();
        prop_assert_eq!(
            single_wire::update(&p, port, SensorModel::Dht22, &mut r),
            PollStatus::Ok
        );

        let mut bad = good;
        bad[corrupt] ^= delta;
        let p = MockPlatform::new();
        script_dht(&p, port.pin, bad);
        let mut r = Readings::default();
        prop_assert_eq!(
            single_wire::update(&p, port, SensorModel::Dht22, &mut r),
            PollStatus::BadCrc
        );
    }
}
