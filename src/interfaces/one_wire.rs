//! Dallas one-wire engine: shared multi-drop bus, ROM addressing, CRC8
//! and the status-driven conversion state machine.
//!
//! One [`OneWireBus`] exists per port and is shared by every sensor
//! attached there; sensors hold it behind `Rc<RefCell<_>>` and the init
//! reference count decides when the pin is actually configured and
//! released. Temperature conversion is asynchronous: `update` issues
//! "convert" and returns [`PollStatus::Polling`], then reads the
//! scratchpad on the sensor's next turn.

use log::trace;

use crate::gpio::{GpioRegistry, Port};
use crate::hal::{PinMode, PinPull, Platform};
use crate::interfaces::{InterfaceKind, UpdateOutcome};
use crate::sensors::{dallas, PollStatus, Readings};

/// 64-bit ROM id, byte 0 = family code, byte 7 = CRC8.
pub type RomId = [u8; 8];

pub const CMD_READ_ROM: u8 = 0x33;
pub const CMD_MATCH_ROM: u8 = 0x55;
pub const CMD_SKIP_ROM: u8 = 0xCC;
pub const CMD_SEARCH_ROM: u8 = 0xF0;
pub const CMD_CONVERT: u8 = 0x44;
pub const CMD_READ_SCRATCHPAD: u8 = 0xBE;
pub const CMD_WRITE_SCRATCHPAD: u8 = 0x4E;
pub const CMD_COPY_SCRATCHPAD: u8 = 0x48;

/// Reset-pulse rise budget. A healthy pull-up recovers in microseconds;
/// past this the line is stuck or shorted.
const RISE_BUDGET_MS: u32 = 10;

/// Bus power wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerMode {
    /// Parasite power: convert must be broadcast and the line held
    /// strongly high for the conversion's duration.
    #[default]
    Passive,
    /// External supply: convert can be addressed per device.
    Active,
}

/// ROM search cursor (one per bus; advances across calls).
struct SearchState {
    /// Highest ambiguous bit position to branch at next; 1..=64, with 0
    /// meaning the tree is exhausted.
    fork_bit: u8,
    rom: RomId,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            fork_bit: 65,
            rom: RomId::default(),
        }
    }
}

/// Shared per-port bus state.
pub struct OneWireBus {
    port: &'static Port,
    /// Number of initialized sensors attached; pin configured on 0→1,
    /// released on 1→0.
    device_count: u8,
    power_mode: PowerMode,
    search: SearchState,
}

impl OneWireBus {
    pub fn new(port: &'static Port) -> Self {
        Self {
            port,
            device_count: 0,
            power_mode: PowerMode::default(),
            search: SearchState::default(),
        }
    }

    pub fn port(&self) -> &'static Port {
        self.port
    }

    pub fn device_count(&self) -> u8 {
        self.device_count
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.power_mode = mode;
    }

    /// Attach one sensor. The pin is configured only on the first attach.
    pub fn init(&mut self, p: &dyn Platform, gpio: &mut GpioRegistry) -> bool {
        self.device_count += 1;
        if self.device_count > 1 {
            return true;
        }
        gpio.lock(self.port, InterfaceKind::OneWire);
        p.pin_init(self.port.pin, PinMode::OutputOpenDrain, PinPull::Up);
        p.pin_write(self.port.pin, true);
        true
    }

    /// Detach one sensor. The pin is released only by the last detach.
    pub fn deinit(&mut self, p: &dyn Platform, gpio: &mut GpioRegistry) {
        self.device_count = self.device_count.saturating_sub(1);
        if self.device_count == 0 {
            p.pin_init(self.port.pin, PinMode::Analog, PinPull::None);
            gpio.unlock(self.port);
        }
    }

    /// Reset pulse + presence detect. `true` when at least one device
    /// answered.
    pub fn reset(&self, p: &dyn Platform) -> bool {
        p.pin_write(self.port.pin, false);
        p.delay_us(500);
        p.pin_write(self.port.pin, true);
        let start = p.now_ms();
        while !p.pin_read(self.port.pin) {
            if p.now_ms().wrapping_sub(start) > RISE_BUDGET_MS {
                return false;
            }
        }
        p.delay_us(100);
        let presence = !p.pin_read(self.port.pin);
        p.delay_us(400);
        presence
    }

    pub fn send_bit(&self, p: &dyn Platform, bit: bool) {
        if bit {
            p.pin_write(self.port.pin, false);
            p.delay_us(1);
            p.pin_write(self.port.pin, true);
            p.delay_us(90);
        } else {
            p.pin_write(self.port.pin, false);
            p.delay_us(90);
            p.pin_write(self.port.pin, true);
            // Wait out the pull-up recovery before the next slot.
            let start = p.now_ms();
            while !p.pin_read(self.port.pin) {
                if p.now_ms().wrapping_sub(start) > RISE_BUDGET_MS {
                    return;
                }
            }
        }
    }

    pub fn read_bit(&self, p: &dyn Platform) -> bool {
        p.delay_ms(1);
        p.pin_write(self.port.pin, false);
        p.delay_us(2);
        p.pin_write(self.port.pin, true);
        p.delay_us(8);
        let bit = p.pin_read(self.port.pin);
        p.delay_us(80);
        bit
    }

    /// LSB-first byte write.
    pub fn send_byte(&self, p: &dyn Platform, byte: u8) {
        for i in 0..8 {
            self.send_bit(p, byte >> i & 1 == 1);
        }
    }

    /// LSB-first byte read.
    pub fn read_byte(&self, p: &dyn Platform) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit(p) {
                byte |= 1 << i;
            }
        }
        byte
    }

    /// Address one device: match-ROM followed by its 64-bit id.
    pub fn select(&self, p: &dyn Platform, id: &RomId) {
        self.send_byte(p, CMD_MATCH_ROM);
        for b in id {
            self.send_byte(p, *b);
        }
    }

    /// Restart ROM enumeration from the top of the tree.
    pub fn search_reset(&mut self) {
        self.search = SearchState::default();
    }

    /// Advance the ROM search one device. `None` once the tree is
    /// exhausted or nothing answers the reset. Returned ids are raw; the
    /// caller decides whether an id already belongs to a sensor.
    pub fn search_next(&mut self, p: &dyn Platform) -> Option<RomId> {
        if self.search.fork_bit == 0 {
            return None;
        }
        if !self.reset(p) {
            self.search.fork_bit = 0;
            return None;
        }
        self.send_byte(p, CMD_SEARCH_ROM);

        let branch_at = self.search.fork_bit;
        let mut next_fork = 0u8;
        let mut rom = self.search.rom;
        for i in 1..=64u8 {
            let byte = usize::from(i - 1) / 8;
            let mask = 1u8 << ((i - 1) % 8);
            let bit = self.read_bit(p);
            let complement = self.read_bit(p);
            let chosen = match (bit, complement) {
                // Nothing drove either slot: all devices dropped out.
                (true, true) => {
                    self.search.fork_bit = 0;
                    return None;
                }
                (true, false) => true,
                (false, true) => false,
                // Devices disagree here: walk zeros first, replaying the
                // previous path above the branch point.
                (false, false) => {
                    if i < branch_at {
                        if rom[byte] & mask != 0 {
                            true
                        } else {
                            next_fork = i;
                            false
                        }
                    } else if i == branch_at {
                        true
                    } else {
                        next_fork = i;
                        false
                    }
                }
            };
            if chosen {
                rom[byte] |= mask;
            } else {
                rom[byte] &= !mask;
            }
            self.send_bit(p, chosen);
        }
        self.search.fork_bit = next_fork;
        self.search.rom = rom;
        Some(rom)
    }
}

/// Dallas CRC8: polynomial 0x8C (reflected 0x31), LSB-first, seed 0.
/// A frame with its trailing CRC byte included checks to zero.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &b in data {
        let mut b = b;
        for _ in 0..8 {
            if (crc ^ b) & 1 != 0 {
                crc = crc >> 1 ^ 0x8C;
            } else {
                crc >>= 1;
            }
            b >>= 1;
        }
    }
    crc
}

/// 16 hex digits, byte 0 first.
pub fn format_rom(id: &RomId) -> String {
    let mut s = String::with_capacity(16);
    for b in id {
        s.push_str(&format!("{b:02X}"));
    }
    s
}

/// Inverse of [`format_rom`]; `None` on anything but 16 hex digits.
pub fn parse_rom(s: &str) -> Option<RomId> {
    if s.len() != 16 || !s.is_ascii() {
        return None;
    }
    let mut id = RomId::default();
    for (i, b) in id.iter_mut().enumerate() {
        *b = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(id)
}

/// Device-level bring-up: discover the id when none was configured, then
/// pin the resolution config for the families that have one.
pub fn sensor_init(p: &dyn Platform, bus: &mut OneWireBus, id: &mut RomId) -> bool {
    if *id == RomId::default() {
        // Single-device shortcut: read-ROM garbles with >1 device on the
        // bus, and the garble fails the CRC.
        if !bus.reset(p) {
            return false;
        }
        bus.send_byte(p, CMD_READ_ROM);
        for b in id.iter_mut() {
            *b = bus.read_byte(p);
        }
        if crc8(id) != 0 || *id == RomId::default() {
            *id = RomId::default();
            return false;
        }
        trace!("discovered one-wire id {}", format_rom(id));
    }
    match dallas::DallasFamily::from_code(id[0]) {
        dallas::DallasFamily::Ds18b20 | dallas::DallasFamily::Ds1822 => {
            if !bus.reset(p) {
                return false;
            }
            bus.select(p, id);
            bus.send_byte(p, CMD_WRITE_SCRATCHPAD);
            // TH/TL alarm defaults, 12-bit resolution.
            for b in [0x4B, 0x46, 0x7F] {
                bus.send_byte(p, b);
            }
            if !bus.reset(p) {
                return false;
            }
            bus.select(p, id);
            bus.send_byte(p, CMD_COPY_SCRATCHPAD);
            true
        }
        _ => true,
    }
}

fn read_scratchpad(p: &dyn Platform, bus: &OneWireBus, id: &RomId) -> Option<[u8; 9]> {
    if !bus.reset(p) {
        return None;
    }
    bus.select(p, id);
    bus.send_byte(p, CMD_READ_SCRATCHPAD);
    let mut sp = [0u8; 9];
    for b in &mut sp {
        *b = bus.read_byte(p);
    }
    Some(sp)
}

/// Status-driven update. One call either starts a conversion (returning
/// `Polling`, with `broadcast` set when every device on the bus was
/// triggered at once) or collects the finished one.
pub fn update(
    p: &dyn Platform,
    bus: &mut OneWireBus,
    id: &RomId,
    prev: PollStatus,
    readings: &mut Readings,
) -> UpdateOutcome {
    match prev {
        // A sibling already broadcast "convert" for us.
        PollStatus::EarlyPoll => UpdateOutcome::status(PollStatus::Polling),
        PollStatus::Polling => UpdateOutcome::status(collect(p, bus, id, readings)),
        _ => start_conversion(p, bus, id, prev),
    }
}

fn start_conversion(
    p: &dyn Platform,
    bus: &mut OneWireBus,
    id: &RomId,
    prev: PollStatus,
) -> UpdateOutcome {
    // After a fault, prove the device is back before trusting a convert.
    if matches!(prev, PollStatus::Timeout | PollStatus::BadCrc)
        && read_scratchpad(p, bus, id).is_none()
    {
        return UpdateOutcome::status(PollStatus::Timeout);
    }
    if !bus.reset(p) {
        return UpdateOutcome::status(PollStatus::Timeout);
    }
    let broadcast = bus.power_mode() == PowerMode::Passive;
    if broadcast {
        bus.send_byte(p, CMD_SKIP_ROM);
    } else {
        bus.select(p, id);
    }
    bus.send_byte(p, CMD_CONVERT);
    if broadcast {
        // Parasite-powered parts draw through the data line; hold it
        // strongly high until the read phase switches back.
        p.pin_init(bus.port().pin, PinMode::OutputPushPull, PinPull::None);
        p.pin_write(bus.port().pin, true);
    }
    UpdateOutcome {
        status: PollStatus::Polling,
        broadcast,
    }
}

fn collect(p: &dyn Platform, bus: &OneWireBus, id: &RomId, readings: &mut Readings) -> PollStatus {
    if bus.power_mode() == PowerMode::Passive {
        p.pin_init(bus.port().pin, PinMode::OutputOpenDrain, PinPull::Up);
        p.pin_write(bus.port().pin, true);
    }
    let Some(sp) = read_scratchpad(p, bus, id) else {
        return PollStatus::Timeout;
    };
    if crc8(&sp) != 0 {
        return PollStatus::BadCrc;
    }
    readings.temp = dallas::decode_temp(dallas::DallasFamily::from_code(id[0]), &sp);
    PollStatus::Ok
}
