//! Scripted mock platform for host-side tests.
//!
//! Records every call so tests can assert on the full hardware
//! interaction history without real GPIO, and replays scripted responses
//! for pin samples and bus transfers.
//!
//! Behavioural model:
//!
//! - `pin_read` pops the next scripted sample for that pin; with an empty
//!   script it returns the pin's last written level (a released open-drain
//!   line reads high, a line nobody drives reads low).
//! - every `pin_read` advances the mock clock by 10 µs and every delay by
//!   its nominal duration, so clock-bounded busy-waits terminate.
//! - I2C/SPI reads pop a scripted response (`None` models a NACK/absent
//!   device); an exhausted script reads as NACK.

use core::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::{PinId, PinMode, PinPull, Platform};

/// One recorded I2C transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cOp {
    Write { addr: u8, data: Vec<u8> },
    Read { addr: u8, len: usize },
}

#[derive(Default)]
struct MockState {
    now_us: u64,
    pin_scripts: HashMap<PinId, VecDeque<bool>>,
    pin_levels: HashMap<PinId, bool>,
    pin_modes: Vec<(PinId, PinMode, PinPull)>,
    pin_writes: Vec<(PinId, bool)>,
    pin_reads: usize,
    aux_power: bool,
    i2c_acquires: u32,
    i2c_releases: u32,
    i2c_log: Vec<I2cOp>,
    i2c_read_script: VecDeque<Option<Vec<u8>>>,
    i2c_write_script: VecDeque<bool>,
    spi_acquires: u32,
    spi_releases: u32,
    spi_read_script: VecDeque<Option<Vec<u8>>>,
}

/// Call-recording, script-replaying [`Platform`] implementation.
pub struct MockPlatform {
    state: RefCell<MockState>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState::default()),
        }
    }

    // ── scripting ─────────────────────────────────────────────

    /// Append samples to a pin's read script.
    pub fn script_pin(&self, pin: PinId, samples: &[bool]) {
        self.state
            .borrow_mut()
            .pin_scripts
            .entry(pin)
            .or_default()
            .extend(samples.iter().copied());
    }

    /// Queue one I2C read response (`None` = NACK).
    pub fn script_i2c_read(&self, response: Option<&[u8]>) {
        self.state
            .borrow_mut()
            .i2c_read_script
            .push_back(response.map(<[u8]>::to_vec));
    }

    /// Queue one I2C write result (`false` = NACK).
    pub fn script_i2c_write(&self, ack: bool) {
        self.state.borrow_mut().i2c_write_script.push_back(ack);
    }

    /// Queue one SPI read frame (`None` = timeout).
    pub fn script_spi_read(&self, response: Option<&[u8]>) {
        self.state
            .borrow_mut()
            .spi_read_script
            .push_back(response.map(<[u8]>::to_vec));
    }

    /// Jump the monotonic clock to an absolute millisecond value.
    pub fn set_now_ms(&self, ms: u32) {
        self.state.borrow_mut().now_us = u64::from(ms) * 1000;
    }

    /// Advance the monotonic clock.
    pub fn advance_ms(&self, ms: u32) {
        self.state.borrow_mut().now_us += u64::from(ms) * 1000;
    }

    // ── inspection ────────────────────────────────────────────

    pub fn pin_read_count(&self) -> usize {
        self.state.borrow().pin_reads
    }

    pub fn pin_writes(&self) -> Vec<(PinId, bool)> {
        self.state.borrow().pin_writes.clone()
    }

    pub fn pin_modes(&self) -> Vec<(PinId, PinMode, PinPull)> {
        self.state.borrow().pin_modes.clone()
    }

    /// Last configured mode for a pin, if any.
    pub fn pin_mode(&self, pin: PinId) -> Option<(PinMode, PinPull)> {
        self.state
            .borrow()
            .pin_modes
            .iter()
            .rev()
            .find(|(p, _, _)| *p == pin)
            .map(|(_, m, pull)| (*m, *pull))
    }

    pub fn i2c_log(&self) -> Vec<I2cOp> {
        self.state.borrow().i2c_log.clone()
    }

    pub fn i2c_acquires(&self) -> u32 {
        self.state.borrow().i2c_acquires
    }

    pub fn spi_acquires(&self) -> u32 {
        self.state.borrow().spi_acquires
    }

    pub fn aux_power_on(&self) -> bool {
        self.state.borrow().aux_power
    }

    /// Unconsumed scripted pin samples for a pin (0 when fully drained).
    pub fn pin_script_remaining(&self, pin: PinId) -> usize {
        self.state
            .borrow()
            .pin_scripts
            .get(&pin)
            .map_or(0, VecDeque::len)
    }
}

impl Platform for MockPlatform {
    fn pin_init(&self, pin: PinId, mode: PinMode, pull: PinPull) {
        self.state.borrow_mut().pin_modes.push((pin, mode, pull));
    }

    fn pin_write(&self, pin: PinId, high: bool) {
        let mut s = self.state.borrow_mut();
        s.pin_levels.insert(pin, high);
        s.pin_writes.push((pin, high));
    }

    fn pin_read(&self, pin: PinId) -> bool {
        let mut s = self.state.borrow_mut();
        s.pin_reads += 1;
        s.now_us += 10;
        if let Some(script) = s.pin_scripts.get_mut(&pin) {
            if let Some(v) = script.pop_front() {
                return v;
            }
        }
        s.pin_levels.get(&pin).copied().unwrap_or(false)
    }

    fn delay_us(&self, us: u32) {
        self.state.borrow_mut().now_us += u64::from(us);
    }

    fn delay_ms(&self, ms: u32) {
        self.state.borrow_mut().now_us += u64::from(ms) * 1000;
    }

    fn now_ms(&self) -> u32 {
        (self.state.borrow().now_us / 1000) as u32
    }

    fn aux_power_enabled(&self) -> bool {
        self.state.borrow().aux_power
    }

    fn aux_power_enable(&self) {
        self.state.borrow_mut().aux_power = true;
    }

    fn aux_power_disable(&self) {
        self.state.borrow_mut().aux_power = false;
    }

    fn i2c_acquire(&self) {
        self.state.borrow_mut().i2c_acquires += 1;
    }

    fn i2c_release(&self) {
        self.state.borrow_mut().i2c_releases += 1;
    }

    fn i2c_write(&self, addr: u8, data: &[u8], _timeout_ms: u32) -> bool {
        let mut s = self.state.borrow_mut();
        s.i2c_log.push(I2cOp::Write {
            addr,
            data: data.to_vec(),
        });
        s.i2c_write_script.pop_front().unwrap_or(true)
    }

    fn i2c_read(&self, addr: u8, buf: &mut [u8], _timeout_ms: u32) -> bool {
        let mut s = self.state.borrow_mut();
        s.i2c_log.push(I2cOp::Read {
            addr,
            len: buf.len(),
        });
        match s.i2c_read_script.pop_front() {
            Some(Some(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                true
            }
            _ => false,
        }
    }

    fn spi_acquire(&self) {
        self.state.borrow_mut().spi_acquires += 1;
    }

    fn spi_release(&self) {
        self.state.borrow_mut().spi_releases += 1;
    }

    fn spi_read(&self, buf: &mut [u8], _timeout_ms: u32) -> bool {
        let mut s = self.state.borrow_mut();
        match s.spi_read_script.pop_front() {
            Some(Some(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                true
            }
            _ => false,
        }
    }
}
