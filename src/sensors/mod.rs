//! Sensor capability model: status taxonomy, the static type catalog and
//! the live sensor instance.
//!
//! The catalog is one fixed table (same idiom as a state-descriptor
//! table): each row binds a stored type name to its capability bundle —
//! bus kind, produced quantities, minimum polling interval and the
//! concrete [`SensorModel`] whose five operations
//! (alloc/init/deinit/update/free) the interface dispatch routes to.
//! Nothing in the table mutates at runtime; rows live for the process
//! lifetime and instances hold `&'static` references into it.

pub mod am2320;
pub mod bmx280;
pub mod dallas;
pub mod dht;
pub mod lm75;
pub mod max318x5;
pub mod scd30;

use core::fmt;

use heapless::String as BoundedString;

use crate::interfaces::{BusInstance, InterfaceKind};

/// Maximum display-name length in bytes.
pub const NAME_CAP: usize = 10;

/// Sentinel for "no reading yet" — distinct from any plausible value.
pub const NO_DATA: f32 = -128.0;

// ---------------------------------------------------------------------------
// Poll status
// ---------------------------------------------------------------------------

/// Per-sensor poll outcome. Drives both the UI and the multi-tick
/// conversion state machine (`Polling` means "come back next tick").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Fresh data decoded and stored.
    Ok,
    /// No response within the bounded wait — device absent/disconnected.
    Timeout,
    /// Scheduling deferral: the minimum interval has not elapsed, or a
    /// sibling already triggered this bus this tick. Not a fault.
    EarlyPoll,
    /// Device responded but the frame failed its checksum.
    BadCrc,
    /// Generic/initialisation failure (wrong chip id, NACKed setup, …).
    Error,
    /// Asynchronous conversion in progress; resume on a later tick.
    Polling,
    /// Administratively excluded from active iteration (editing,
    /// soft-delete). Never produced by an engine.
    Inactive,
}

impl PollStatus {
    /// Whether the previous cycle ended in a fault that warrants
    /// re-validation before the next bus access.
    pub fn is_fault(self) -> bool {
        matches!(self, Self::Timeout | Self::BadCrc | Self::Error)
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Timeout => "timeout",
            Self::EarlyPoll => "early poll",
            Self::BadCrc => "bad crc",
            Self::Error => "error",
            Self::Polling => "polling",
            Self::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Produced quantities
// ---------------------------------------------------------------------------

/// Bitmask of physical quantities a sensor type produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantities(u8);

impl Quantities {
    pub const TEMPERATURE: Quantities = Quantities(0b0001);
    pub const HUMIDITY: Quantities = Quantities(0b0010);
    pub const PRESSURE: Quantities = Quantities(0b0100);
    pub const CO2: Quantities = Quantities(0b1000);

    pub const fn union(self, other: Quantities) -> Quantities {
        Quantities(self.0 | other.0)
    }

    pub const fn has(self, other: Quantities) -> bool {
        self.0 & other.0 == other.0
    }
}

// ---------------------------------------------------------------------------
// Sensor models and the type catalog
// ---------------------------------------------------------------------------

/// Closed set of supported sensor models. The sensor-level operations
/// dispatch on this tag; adding a model means adding a variant and a
/// catalog row, never touching scheduling or bus logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorModel {
    Dht11,
    Dht12,
    Dht21,
    Dht22,
    Am2320Sw,
    Am2320,
    Lm75,
    Bmp280,
    Bme280,
    Scd30,
    Dallas,
    Max6675,
    Max31855,
}

/// Immutable capability descriptor — one catalog row.
#[derive(Debug)]
pub struct SensorType {
    /// Stored type name; exact-match key for persistence.
    pub name: &'static str,
    /// Longer UI label, when the stored name is too terse.
    pub alt_name: Option<&'static str>,
    pub quantities: Quantities,
    pub interface: InterfaceKind,
    /// Minimum time between two bus accesses for this type.
    pub poll_interval_ms: u32,
    pub model: SensorModel,
    /// Valid 7-bit address range in pre-shifted 8-bit form (I2C only).
    pub i2c_addr_min: u8,
    pub i2c_addr_max: u8,
}

const TH: Quantities = Quantities::TEMPERATURE.union(Quantities::HUMIDITY);

/// The global catalog. Fixed at compile time; reverse lookup by index is
/// stable across runs and used by the persistence collaborator.
pub static SENSOR_TYPES: &[SensorType] = &[
    SensorType {
        name: "DHT11",
        alt_name: None,
        quantities: TH,
        interface: InterfaceKind::SingleWire,
        poll_interval_ms: 2000,
        model: SensorModel::Dht11,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "DHT12",
        alt_name: Some("DHT12 (1 wire)"),
        quantities: TH,
        interface: InterfaceKind::SingleWire,
        poll_interval_ms: 2000,
        model: SensorModel::Dht12,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "DHT21",
        alt_name: Some("DHT21 (AM2301)"),
        quantities: TH,
        interface: InterfaceKind::SingleWire,
        poll_interval_ms: 2000,
        model: SensorModel::Dht21,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "DHT22",
        alt_name: Some("DHT22 (AM2302)"),
        quantities: TH,
        interface: InterfaceKind::SingleWire,
        poll_interval_ms: 2000,
        model: SensorModel::Dht22,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "AM2320_SW",
        alt_name: Some("AM2320 (1 wire)"),
        quantities: TH,
        interface: InterfaceKind::SingleWire,
        poll_interval_ms: 2000,
        model: SensorModel::Am2320Sw,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "AM2320",
        alt_name: Some("AM2320 (I2C)"),
        quantities: TH,
        interface: InterfaceKind::I2c,
        poll_interval_ms: 2000,
        model: SensorModel::Am2320,
        i2c_addr_min: 0xB8,
        i2c_addr_max: 0xB8,
    },
    SensorType {
        name: "LM75",
        alt_name: None,
        quantities: Quantities::TEMPERATURE,
        interface: InterfaceKind::I2c,
        poll_interval_ms: 1000,
        model: SensorModel::Lm75,
        i2c_addr_min: 0x90,
        i2c_addr_max: 0x9E,
    },
    SensorType {
        name: "BMP280",
        alt_name: None,
        quantities: Quantities::TEMPERATURE.union(Quantities::PRESSURE),
        interface: InterfaceKind::I2c,
        poll_interval_ms: 500,
        model: SensorModel::Bmp280,
        i2c_addr_min: 0xEC,
        i2c_addr_max: 0xEE,
    },
    SensorType {
        name: "BME280",
        alt_name: None,
        quantities: TH.union(Quantities::PRESSURE),
        interface: InterfaceKind::I2c,
        poll_interval_ms: 500,
        model: SensorModel::Bme280,
        i2c_addr_min: 0xEC,
        i2c_addr_max: 0xEE,
    },
    SensorType {
        name: "SCD30",
        alt_name: Some("SCD30 (CO2)"),
        quantities: TH.union(Quantities::CO2),
        interface: InterfaceKind::I2c,
        poll_interval_ms: 2000,
        model: SensorModel::Scd30,
        i2c_addr_min: 0xC2,
        i2c_addr_max: 0xC2,
    },
    SensorType {
        name: "Dallas",
        alt_name: Some("Dallas (DS18x2x)"),
        quantities: Quantities::TEMPERATURE,
        interface: InterfaceKind::OneWire,
        poll_interval_ms: 1000,
        model: SensorModel::Dallas,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "MAX6675",
        alt_name: None,
        quantities: Quantities::TEMPERATURE,
        interface: InterfaceKind::Spi,
        poll_interval_ms: 500,
        model: SensorModel::Max6675,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
    SensorType {
        name: "MAX31855",
        alt_name: None,
        quantities: Quantities::TEMPERATURE,
        interface: InterfaceKind::Spi,
        poll_interval_ms: 500,
        model: SensorModel::Max31855,
        i2c_addr_min: 0,
        i2c_addr_max: 0,
    },
];

/// Exact-match lookup by stored type name.
pub fn type_by_name(name: &str) -> Option<&'static SensorType> {
    SENSOR_TYPES.iter().find(|t| t.name == name)
}

/// Stable catalog index lookup (persistence).
pub fn type_by_index(index: usize) -> Option<&'static SensorType> {
    SENSOR_TYPES.get(index)
}

/// Reverse lookup: descriptor to stable index, by name identity.
pub fn type_index(ty: &SensorType) -> Option<usize> {
    SENSOR_TYPES.iter().position(|t| t.name == ty.name)
}

// ---------------------------------------------------------------------------
// Live sensor instance
// ---------------------------------------------------------------------------

/// Last decoded readings, in raw units (°C / % / Pa / ppm) until the
/// manager applies display conversions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub temp: f32,
    pub hum: f32,
    pub pressure: f32,
    pub co2: f32,
}

impl Default for Readings {
    fn default() -> Self {
        Self {
            temp: NO_DATA,
            hum: NO_DATA,
            pressure: NO_DATA,
            co2: NO_DATA,
        }
    }
}

/// One live sensor. Created/destroyed only by the manager; the opaque
/// bus instance is owned exclusively by this sensor and released through
/// the interface releaser chain.
pub struct Sensor {
    pub name: BoundedString<NAME_CAP>,
    pub ty: &'static SensorType,
    pub status: PollStatus,
    /// Set by a successful interface bring-up and cleared by teardown;
    /// a sensor whose bring-up failed must never reach `deinit`, or a
    /// shared bus refcount would drop below its real user count.
    pub initialized: bool,
    /// Monotonic-nondecreasing timestamp of the last real bus access.
    pub last_poll_ms: u32,
    pub readings: Readings,
    /// Signed temperature trim, tenths of a degree.
    pub temp_offset_tenths: i16,
    /// Bus-specific state blob.
    pub instance: BusInstance,
}

impl Sensor {
    /// Truncate a requested display name into the bounded on-sensor form.
    pub fn bounded_name(name: &str) -> BoundedString<NAME_CAP> {
        let mut out = BoundedString::new();
        for c in name.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        out
    }

    /// Whether this sensor participates in active iteration.
    pub fn is_active(&self) -> bool {
        self.status != PollStatus::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup_is_exact() {
        assert!(type_by_name("DHT22").is_some());
        assert!(type_by_name("dht22").is_none());
        assert!(type_by_name("DHT2").is_none());
    }

    #[test]
    fn reverse_lookup_is_stable() {
        for (i, ty) in SENSOR_TYPES.iter().enumerate() {
            assert_eq!(type_index(ty), Some(i));
            assert_eq!(type_by_index(i).unwrap().name, ty.name);
        }
    }

    #[test]
    fn catalog_covers_all_interfaces_and_quantities() {
        let mut q = 0u8;
        for kind in [
            InterfaceKind::SingleWire,
            InterfaceKind::OneWire,
            InterfaceKind::I2c,
            InterfaceKind::Spi,
        ] {
            assert!(
                SENSOR_TYPES.iter().any(|t| t.interface == kind),
                "no sensor for {}",
                kind.name()
            );
        }
        for t in SENSOR_TYPES {
            for (bit, mask) in [
                Quantities::TEMPERATURE,
                Quantities::HUMIDITY,
                Quantities::PRESSURE,
                Quantities::CO2,
            ]
            .iter()
            .enumerate()
            {
                if t.quantities.has(*mask) {
                    q |= 1 << bit;
                }
            }
        }
        assert_eq!(q, 0b1111);
    }

    #[test]
    fn i2c_rows_carry_address_ranges() {
        for t in SENSOR_TYPES {
            if t.interface == InterfaceKind::I2c {
                assert!(t.i2c_addr_min > 0);
                assert!(t.i2c_addr_min <= t.i2c_addr_max);
                // Pre-shifted addresses are even.
                assert_eq!(t.i2c_addr_min % 2, 0);
            }
        }
    }

    #[test]
    fn name_is_bounded() {
        let n = Sensor::bounded_name("a far too long sensor name");
        assert_eq!(n.len(), NAME_CAP);
    }
}
