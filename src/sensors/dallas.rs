//! Dallas DS18x2x family codes and scratchpad decoding.

/// Device family, from ROM byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DallasFamily {
    Ds18b20,
    Ds18s20,
    Ds1822,
    Unknown,
}

impl DallasFamily {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x28 => Self::Ds18b20,
            0x10 => Self::Ds18s20,
            0x22 => Self::Ds1822,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ds18b20 => "DS18B20",
            Self::Ds18s20 => "DS18S20",
            Self::Ds1822 => "DS1822",
            Self::Unknown => "DS18x2x",
        }
    }
}

/// Temperature from a CRC-valid scratchpad. The legacy DS18S20 counts
/// half degrees; everything else is 1/16 °C at 12-bit resolution.
pub fn decode_temp(family: DallasFamily, sp: &[u8; 9]) -> f32 {
    let raw = i16::from_le_bytes([sp[0], sp[1]]);
    match family {
        DallasFamily::Ds18s20 => f32::from(raw) / 2.0,
        _ => f32::from(raw) / 16.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(raw: i16) -> [u8; 9] {
        let mut sp = [0u8; 9];
        sp[..2].copy_from_slice(&raw.to_le_bytes());
        sp
    }

    #[test]
    fn family_codes() {
        assert_eq!(DallasFamily::from_code(0x28), DallasFamily::Ds18b20);
        assert_eq!(DallasFamily::from_code(0x10), DallasFamily::Ds18s20);
        assert_eq!(DallasFamily::from_code(0x22), DallasFamily::Ds1822);
        assert_eq!(DallasFamily::from_code(0x42), DallasFamily::Unknown);
    }

    #[test]
    fn standard_family_sixteenths() {
        assert!((decode_temp(DallasFamily::Ds18b20, &sp(0x0191)) - 25.0625).abs() < 1e-6);
        assert!((decode_temp(DallasFamily::Ds1822, &sp(-88)) - -5.5).abs() < 1e-6);
    }

    #[test]
    fn legacy_family_halves() {
        assert!((decode_temp(DallasFamily::Ds18s20, &sp(50)) - 25.0).abs() < 1e-6);
        assert!((decode_temp(DallasFamily::Ds18s20, &sp(-21)) - -10.5).abs() < 1e-6);
    }
}
