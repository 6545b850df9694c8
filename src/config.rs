//! Runtime settings for the polling core.
//!
//! The host application persists these however it likes (the crate only
//! offers a compact postcard blob); the manager consults them when
//! post-processing fresh readings and when tearing the auxiliary power
//! rail down.

use serde::{Deserialize, Serialize};

use crate::units::{PressureUnit, TempUnit};

/// User-facing settings consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Display unit applied to fresh temperature readings.
    pub temp_unit: TempUnit,
    /// Display unit applied to fresh pressure readings.
    pub pressure_unit: PressureUnit,
    /// Whether the auxiliary 5 V rail was already on when the core
    /// started. If it was, deinit leaves it on instead of switching it
    /// off behind the host's back.
    pub aux_power_was_on: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp_unit: TempUnit::Celsius,
            pressure_unit: PressureUnit::Pascal,
            aux_power_was_on: false,
        }
    }
}

impl Settings {
    /// Serialise into a compact blob for host-side persistence.
    pub fn to_blob(&self) -> Vec<u8> {
        postcard::to_allocvec(self).unwrap_or_default()
    }

    /// Restore from a blob previously produced by [`Settings::to_blob`].
    /// Falls back to defaults on a malformed blob.
    pub fn from_blob(blob: &[u8]) -> Self {
        postcard::from_bytes(blob).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_metric() {
        let s = Settings::default();
        assert_eq!(s.temp_unit, TempUnit::Celsius);
        assert_eq!(s.pressure_unit, PressureUnit::Pascal);
        assert!(!s.aux_power_was_on);
    }

    #[test]
    fn postcard_roundtrip() {
        let s = Settings {
            temp_unit: TempUnit::Fahrenheit,
            pressure_unit: PressureUnit::MmHg,
            aux_power_was_on: true,
        };
        let blob = s.to_blob();
        assert_eq!(Settings::from_blob(&blob), s);
    }

    #[test]
    fn malformed_blob_falls_back_to_defaults() {
        assert_eq!(Settings::from_blob(&[0xFF; 3]), Settings::default());
    }

    #[test]
    fn serde_json_roundtrip() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let s2: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, s2);
    }
}
