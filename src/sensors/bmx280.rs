//! Bosch BMP280/BME280: identification, trimming-coefficient load and
//! the fixed-point compensation arithmetic from the datasheet.
//!
//! Measurements run in forced mode across two polls: the first arms one
//! conversion and reports `Polling`, the next reads the burst at 0xF7
//! once the busy flag has cleared. The compensation code
//! keeps the datasheet's integer formulation (including `t_fine` linking
//! the temperature and pressure paths) rather than a float rewrite, so
//! outputs are bit-comparable with the reference.

use crate::hal::Platform;
use crate::interfaces::i2c;
use crate::sensors::{PollStatus, Readings, SensorModel};

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_H2: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CHIP_ID_BMP280: u8 = 0x58;
const CHIP_ID_BME280: u8 = 0x60;

/// 1x oversampling on both channels, forced mode.
const CTRL_MEAS_FORCED: u8 = 0x25;
const STATUS_MEASURING: u8 = 0x08;

/// Factory trimming coefficients.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calibration {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,
    dig_p1: u16,
    dig_p2: i16,
    dig_p3: i16,
    dig_p4: i16,
    dig_p5: i16,
    dig_p6: i16,
    dig_p7: i16,
    dig_p8: i16,
    dig_p9: i16,
    dig_h1: u8,
    dig_h2: i16,
    dig_h3: u8,
    dig_h4: i16,
    dig_h5: i16,
    dig_h6: i8,
}

/// Identify the chip and pull its trimming table. `None` on a missing
/// device or a foreign chip id.
pub fn init(p: &dyn Platform, addr: u8, model: SensorModel) -> Option<Calibration> {
    let expected = match model {
        SensorModel::Bmp280 => CHIP_ID_BMP280,
        SensorModel::Bme280 => CHIP_ID_BME280,
        _ => return None,
    };
    if i2c::read_reg(p, addr, REG_CHIP_ID)? != expected {
        return None;
    }

    let mut tp = [0u8; 24];
    if !i2c::read_regs(p, addr, REG_CALIB_TP, &mut tp) {
        return None;
    }
    let le16 = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
    let mut calib = Calibration {
        dig_t1: le16(0),
        dig_t2: le16(2) as i16,
        dig_t3: le16(4) as i16,
        dig_p1: le16(6),
        dig_p2: le16(8) as i16,
        dig_p3: le16(10) as i16,
        dig_p4: le16(12) as i16,
        dig_p5: le16(14) as i16,
        dig_p6: le16(16) as i16,
        dig_p7: le16(18) as i16,
        dig_p8: le16(20) as i16,
        dig_p9: le16(22) as i16,
        ..Calibration::default()
    };

    if model == SensorModel::Bme280 {
        calib.dig_h1 = i2c::read_reg(p, addr, REG_CALIB_H1)?;
        let mut h = [0u8; 7];
        if !i2c::read_regs(p, addr, REG_CALIB_H2, &mut h) {
            return None;
        }
        calib.dig_h2 = i16::from_le_bytes([h[0], h[1]]);
        calib.dig_h3 = h[2];
        // H4/H5 share a nibble-packed byte at 0xE5.
        calib.dig_h4 = i16::from(h[3]) << 4 | i16::from(h[4] & 0x0F);
        calib.dig_h5 = i16::from(h[5]) << 4 | i16::from(h[4] >> 4);
        calib.dig_h6 = h[6] as i8;
        // 1x humidity oversampling; takes effect on the next ctrl_meas.
        if !i2c::write_reg(p, addr, REG_CTRL_HUM, 0x01) {
            return None;
        }
    }
    Some(calib)
}

/// One step of the forced-mode measurement cycle. Any status other than
/// an in-flight `Polling` arms a fresh conversion; the collect step reads
/// the burst once the busy flag has cleared.
pub fn read(
    p: &dyn Platform,
    addr: u8,
    model: SensorModel,
    calib: &Calibration,
    prev: PollStatus,
    readings: &mut Readings,
) -> PollStatus {
    if prev != PollStatus::Polling {
        if !i2c::write_reg(p, addr, REG_CTRL_MEAS, CTRL_MEAS_FORCED) {
            return PollStatus::Timeout;
        }
        return PollStatus::Polling;
    }

    let Some(status) = i2c::read_reg(p, addr, REG_STATUS) else {
        return PollStatus::Timeout;
    };
    if status & STATUS_MEASURING != 0 {
        return PollStatus::Polling;
    }

    let mut d = [0u8; 8];
    if !i2c::read_regs(p, addr, REG_DATA, &mut d) {
        return PollStatus::Timeout;
    }
    let adc_p = i32::from(d[0]) << 12 | i32::from(d[1]) << 4 | i32::from(d[2]) >> 4;
    let adc_t = i32::from(d[3]) << 12 | i32::from(d[4]) << 4 | i32::from(d[5]) >> 4;

    let (t_fine, temp) = compensate_temp(calib, adc_t);
    readings.temp = temp;
    match compensate_press(calib, t_fine, adc_p) {
        Some(pa) => readings.pressure = pa,
        None => return PollStatus::Error,
    }
    if model == SensorModel::Bme280 {
        let adc_h = i32::from(d[6]) << 8 | i32::from(d[7]);
        readings.hum = compensate_hum(calib, t_fine, adc_h);
    }
    PollStatus::Ok
}

/// Returns `t_fine` and the temperature in °C (0.01 °C resolution).
fn compensate_temp(c: &Calibration, adc_t: i32) -> (i32, f32) {
    let t1 = i32::from(c.dig_t1);
    let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(c.dig_t2)) >> 11;
    let var2 = ((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * i32::from(c.dig_t3) >> 14;
    let t_fine = var1 + var2;
    let centi = (t_fine * 5 + 128) >> 8;
    (t_fine, centi as f32 / 100.0)
}

/// Pressure in Pa. `None` when the divisor degenerates to zero (only
/// possible with a zeroed trimming table).
fn compensate_press(c: &Calibration, t_fine: i32, adc_p: i32) -> Option<f32> {
    let mut var1 = i64::from(t_fine) - 128000;
    let mut var2 = var1 * var1 * i64::from(c.dig_p6);
    var2 += (var1 * i64::from(c.dig_p5)) << 17;
    var2 += i64::from(c.dig_p4) << 35;
    var1 = ((var1 * var1 * i64::from(c.dig_p3)) >> 8) + ((var1 * i64::from(c.dig_p2)) << 12);
    var1 = (((1i64 << 47) + var1) * i64::from(c.dig_p1)) >> 33;
    if var1 == 0 {
        return None;
    }
    let mut pr = 1_048_576 - i64::from(adc_p);
    pr = (((pr << 31) - var2) * 3125) / var1;
    var1 = (i64::from(c.dig_p9) * (pr >> 13) * (pr >> 13)) >> 25;
    var2 = (i64::from(c.dig_p8) * pr) >> 19;
    pr = ((pr + var1 + var2) >> 8) + (i64::from(c.dig_p7) << 4);
    // Q24.8 fixed point.
    Some(pr as f32 / 256.0)
}

/// Relative humidity in %, clamped to 0..=100.
fn compensate_hum(c: &Calibration, t_fine: i32, adc_h: i32) -> f32 {
    let mut v = t_fine - 76_800;
    v = (((adc_h << 14) - (i32::from(c.dig_h4) << 20) - i32::from(c.dig_h5) * v + 16_384) >> 15)
        * (((((((v * i32::from(c.dig_h6)) >> 10)
            * (((v * i32::from(c.dig_h3)) >> 11) + 32_768))
            >> 10)
            + 2_097_152)
            * i32::from(c.dig_h2)
            + 8_192)
            >> 14);
    v -= (((v >> 15) * (v >> 15)) >> 7) * i32::from(c.dig_h1) >> 4;
    v = v.clamp(0, 419_430_400);
    // Q22.10 fixed point.
    (v >> 12) as f32 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{I2cOp, MockPlatform};

    /// Trimming values from the datasheet's worked example.
    fn datasheet_calib() -> Calibration {
        Calibration {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
            ..Calibration::default()
        }
    }

    #[test]
    fn datasheet_temperature_vector() {
        let (_, t) = compensate_temp(&datasheet_calib(), 519_888);
        assert!((t - 25.08).abs() < 0.005);
    }

    #[test]
    fn datasheet_pressure_vector() {
        let c = datasheet_calib();
        let (t_fine, _) = compensate_temp(&c, 519_888);
        let pa = compensate_press(&c, t_fine, 415_148).unwrap();
        assert!((pa - 100_653.27).abs() < 1.0);
    }

    #[test]
    fn zeroed_trimming_table_is_an_error() {
        let c = Calibration::default();
        let (t_fine, _) = compensate_temp(&c, 519_888);
        assert!(compensate_press(&c, t_fine, 415_148).is_none());
    }

    #[test]
    fn wrong_chip_id_fails_init() {
        let p = MockPlatform::new();
        p.script_i2c_write(true);
        p.script_i2c_read(Some(&[0x61]));
        assert!(init(&p, 0xEC, SensorModel::Bmp280).is_none());
    }

    #[test]
    fn forced_mode_arms_then_collects_on_the_next_poll() {
        let p = MockPlatform::new();
        let c = datasheet_calib();
        let mut r = Readings::default();

        // Arm pass: one ctrl_meas write, nothing decoded yet.
        let status = read(&p, 0xEC, SensorModel::Bmp280, &c, PollStatus::Ok, &mut r);
        assert_eq!(status, PollStatus::Polling);
        assert_eq!(r.temp, crate::sensors::NO_DATA);
        assert_eq!(
            p.i2c_log(),
            vec![I2cOp::Write { addr: 0xEC, data: vec![REG_CTRL_MEAS, CTRL_MEAS_FORCED] }]
        );

        // Collect pass: status idle, then the data burst carrying the
        // datasheet raw values: adc_p 415148, adc_t 519888.
        p.script_i2c_read(Some(&[0x00]));
        p.script_i2c_read(Some(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x00, 0x00]));
        let status = read(&p, 0xEC, SensorModel::Bmp280, &c, PollStatus::Polling, &mut r);
        assert_eq!(status, PollStatus::Ok);
        assert!((r.temp - 25.08).abs() < 0.005);
        assert!((r.pressure - 100_653.27).abs() < 1.0);
        // BMP280 has no humidity channel.
        assert_eq!(r.hum, crate::sensors::NO_DATA);
    }

    #[test]
    fn busy_flag_keeps_the_measurement_polling() {
        let p = MockPlatform::new();
        let c = datasheet_calib();
        let mut r = Readings::default();
        p.script_i2c_read(Some(&[STATUS_MEASURING]));
        let status = read(&p, 0xEC, SensorModel::Bmp280, &c, PollStatus::Polling, &mut r);
        assert_eq!(status, PollStatus::Polling);
        assert_eq!(r.temp, crate::sensors::NO_DATA);
    }
}
