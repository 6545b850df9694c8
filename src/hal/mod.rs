//! Platform port — the boundary between the polling core and the board.
//!
//! ```text
//!   board adapter ──▶ Platform trait ──▶ engines / manager (domain)
//! ```
//!
//! The protocol engines never touch hardware directly: every GPIO access,
//! delay, clock query and blocking I2C/SPI transfer goes through this
//! trait, so the whole core runs unmodified against [`mock::MockPlatform`]
//! on the host.
//!
//! Contract notes:
//!
//! - `now_ms` is a monotonic millisecond tick; callers compare with
//!   `wrapping_sub`, so wrap-around at `u32::MAX` is fine.
//! - I2C addresses are the 8-bit (pre-shifted left by one) form throughout.
//! - `i2c_acquire` must leave both shared lines configured with pull-ups;
//!   it is called before *every* transfer as a cheap idempotent step.
//! - All bus calls are blocking but bounded: they either finish within the
//!   given timeout or return `false`.

pub mod mock;

/// Opaque physical pin handle. The board table maps logical ports onto
/// these; only the platform adapter knows what the number means.
pub type PinId = u8;

/// Electrical mode of a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    OutputPushPull,
    OutputOpenDrain,
    /// High-impedance / analog — the released state.
    Analog,
}

/// Pull resistor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPull {
    None,
    Up,
    Down,
}

/// Platform port trait. One implementation per board; one scripted mock
/// for tests.
pub trait Platform {
    /// Configure a pin's mode and pull.
    fn pin_init(&self, pin: PinId, mode: PinMode, pull: PinPull);
    /// Drive a pin (meaningful in output modes; in open-drain `true`
    /// releases the line to the pull-up).
    fn pin_write(&self, pin: PinId, high: bool);
    /// Sample a pin's input level.
    fn pin_read(&self, pin: PinId) -> bool;

    /// Busy-wait for `us` microseconds.
    fn delay_us(&self, us: u32);
    /// Busy-wait for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
    /// Monotonic milliseconds since boot (wraps).
    fn now_ms(&self) -> u32;

    /// Whether the auxiliary 5 V sensor rail is currently on.
    fn aux_power_enabled(&self) -> bool;
    /// Switch the auxiliary rail on (idempotent).
    fn aux_power_enable(&self);
    /// Switch the auxiliary rail off.
    fn aux_power_disable(&self);

    /// Claim the shared two-wire bus and force pull-ups on both lines.
    fn i2c_acquire(&self);
    /// Release the shared two-wire bus.
    fn i2c_release(&self);
    /// Blocking write to an 8-bit (pre-shifted) address. `false` on NACK
    /// or timeout.
    fn i2c_write(&self, addr: u8, data: &[u8], timeout_ms: u32) -> bool;
    /// Blocking read from an 8-bit (pre-shifted) address. `false` on NACK
    /// or timeout.
    fn i2c_read(&self, addr: u8, buf: &mut [u8], timeout_ms: u32) -> bool;

    /// Claim the shared SPI lines (clock/MOSI/MISO).
    fn spi_acquire(&self);
    /// Release the shared SPI lines.
    fn spi_release(&self);
    /// Clock `buf.len()` bytes out of the selected device. The caller owns
    /// chip-select framing. `false` on timeout.
    fn spi_read(&self, buf: &mut [u8], timeout_ms: u32) -> bool;
}
