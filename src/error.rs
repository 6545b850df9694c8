//! Unified error types for the polysense core.
//!
//! Protocol-level outcomes (timeouts, CRC failures, in-progress
//! conversions) are *not* errors — they travel as
//! [`PollStatus`](crate::sensors::PollStatus) values through the scheduler.
//! This module covers the fallible control-plane paths only: creating a
//! sensor from stored arguments, claiming GPIO resources, parsing the
//! sensor list. All variants are `Copy` so they can be passed around
//! without allocation.

use core::fmt;

/// Every fallible control-plane operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The bus-specific argument string could not be parsed.
    Args(&'static str),
    /// The stored sensor type name is not in the catalog.
    UnknownType,
    /// The requested port number is not in the board table.
    UnknownPort,
    /// The port (or a fixed bus line) is already claimed by an
    /// incompatible interface.
    PortUnavailable,
    /// An I2C address outside the sensor type's valid range.
    AddressOutOfRange,
    /// The display name is empty or otherwise unusable.
    NameInvalid,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args(msg) => write!(f, "bad arguments: {msg}"),
            Self::UnknownType => write!(f, "unknown sensor type"),
            Self::UnknownPort => write!(f, "unknown port"),
            Self::PortUnavailable => write!(f, "port unavailable"),
            Self::AddressOutOfRange => write!(f, "I2C address out of range"),
            Self::NameInvalid => write!(f, "invalid sensor name"),
        }
    }
}

impl core::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
