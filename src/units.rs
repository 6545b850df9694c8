//! Display-unit conversion helpers.
//!
//! Sensors always report raw SI-ish values: temperature in °C, pressure in
//! Pa. The manager converts a fresh reading into the configured display
//! unit exactly once per successful poll, so these stay pure
//! `(value, unit) -> value` functions with no state.

use serde::{Deserialize, Serialize};

/// Temperature display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Pressure display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PressureUnit {
    /// Raw pascal, no conversion.
    #[default]
    Pascal,
    MmHg,
    InHg,
    KiloPascal,
}

/// Convert a temperature in °C into the requested display unit.
pub fn convert_temp(celsius: f32, unit: TempUnit) -> f32 {
    match unit {
        TempUnit::Celsius => celsius,
        TempUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    }
}

/// Convert a pressure in Pa into the requested display unit.
pub fn convert_pressure(pascal: f32, unit: PressureUnit) -> f32 {
    match unit {
        PressureUnit::Pascal => pascal,
        PressureUnit::MmHg => pascal * 0.007_500_62,
        PressureUnit::InHg => pascal * 0.000_295_3,
        PressureUnit::KiloPascal => pascal / 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_is_identity() {
        assert_eq!(convert_temp(21.5, TempUnit::Celsius), 21.5);
    }

    #[test]
    fn fahrenheit_reference_points() {
        assert!((convert_temp(0.0, TempUnit::Fahrenheit) - 32.0).abs() < 0.001);
        assert!((convert_temp(100.0, TempUnit::Fahrenheit) - 212.0).abs() < 0.001);
    }

    #[test]
    fn pressure_standard_atmosphere() {
        let atm = 101_325.0;
        assert!((convert_pressure(atm, PressureUnit::MmHg) - 760.0).abs() < 0.5);
        assert!((convert_pressure(atm, PressureUnit::InHg) - 29.92).abs() < 0.05);
        assert!((convert_pressure(atm, PressureUnit::KiloPascal) - 101.325).abs() < 0.001);
    }
}
