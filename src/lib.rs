//! polysense — a uniform polling core for heterogeneous environmental
//! sensors on single-wire, one-wire (Dallas), I2C and SPI buses.
//!
//! The crate is platform-agnostic: all hardware access goes through the
//! [`hal::Platform`] port, so the protocol engines, the pin-ownership
//! registry and the tick-driven scheduler run unmodified on the host
//! against [`hal::mock::MockPlatform`].
//!
//! ```no_run
//! use polysense::config::Settings;
//! use polysense::gpio::DEFAULT_BOARD;
//! use polysense::hal::mock::MockPlatform;
//! use polysense::manager::SensorManager;
//! use polysense::sensors::type_by_name;
//!
//! let mut mgr = SensorManager::new(MockPlatform::new(), &DEFAULT_BOARD, Settings::default());
//! let ty = type_by_name("DHT22").unwrap();
//! mgr.create("Outdoor", ty, 0, "2").unwrap();
//! mgr.init_all();
//! loop {
//!     mgr.tick();
//!     // host delay between passes
//! }
//! ```

pub mod config;
pub mod error;
pub mod gpio;
pub mod hal;
pub mod interfaces;
pub mod manager;
pub mod sensors;
pub mod store;
pub mod units;

pub use config::Settings;
pub use error::{Error, Result};
pub use manager::SensorManager;
pub use sensors::{PollStatus, Readings, Sensor, SensorType, NO_DATA, SENSOR_TYPES};
