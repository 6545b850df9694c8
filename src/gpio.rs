//! Logical port table and the shared-pin ownership registry.
//!
//! Single source of truth for which external ports exist and which
//! interface currently claims each one. The registry is pure
//! bookkeeping — it never touches hardware — so every engine asks it
//! before reconfiguring a pin and tells it when a pin is released.
//!
//! Exclusive buses (single-wire, a SPI chip-select) need a free port;
//! multi-drop buses (one-wire, I2C) may pile onto a port already owned by
//! the *same* interface and track membership with reference counts held
//! elsewhere (on the [`OneWireBus`](crate::interfaces::one_wire::OneWireBus),
//! and here for the fixed I2C/SPI lines).

use log::debug;

use crate::hal::PinId;
use crate::interfaces::InterfaceKind;

/// One externally wired logical port. Static, enumerable, immutable.
#[derive(Debug, PartialEq, Eq)]
pub struct Port {
    /// Board-facing port number (what the user types / the config stores).
    pub num: u8,
    /// Human-readable label for the UI collaborator.
    pub name: &'static str,
    /// Physical pin handle passed to the platform adapter.
    pub pin: PinId,
}

/// Board description: the enumerable port table plus the fixed bus lines.
///
/// I2C data/clock and the three shared SPI lines are regular table
/// entries (so they participate in ownership tracking) but are never
/// offered as per-sensor ports; SPI chip-select is the one SPI line
/// chosen per sensor.
pub struct Board {
    pub ports: &'static [Port],
    /// Port numbers of the fixed I2C lines: `[SDA, SCL]`.
    pub i2c_ports: [u8; 2],
    /// Port numbers of the fixed SPI lines: `[MOSI, MISO, SCK]`.
    pub spi_ports: [u8; 3],
}

/// Default 13-port external header layout.
pub static DEFAULT_BOARD: Board = Board {
    ports: &[
        Port { num: 2, name: "2 (A7)", pin: 7 },
        Port { num: 3, name: "3 (A6)", pin: 6 },
        Port { num: 4, name: "4 (A4)", pin: 4 },
        Port { num: 5, name: "5 (B3)", pin: 19 },
        Port { num: 6, name: "6 (B2)", pin: 18 },
        Port { num: 7, name: "7 (C3)", pin: 35 },
        Port { num: 10, name: "10 (SWC)", pin: 14 },
        Port { num: 12, name: "12 (SIO)", pin: 13 },
        Port { num: 13, name: "13 (TX)", pin: 22 },
        Port { num: 14, name: "14 (RX)", pin: 23 },
        Port { num: 15, name: "15 (C1)", pin: 33 },
        Port { num: 16, name: "16 (C0)", pin: 32 },
        Port { num: 17, name: "17 (1W)", pin: 16 },
    ],
    i2c_ports: [15, 16],
    spi_ports: [2, 3, 5],
};

/// Ownership registry over a board's port table.
pub struct GpioRegistry {
    board: &'static Board,
    owners: Vec<Option<InterfaceKind>>,
    i2c_users: u8,
    spi_users: u8,
}

impl GpioRegistry {
    pub fn new(board: &'static Board) -> Self {
        Self {
            board,
            owners: vec![None; board.ports.len()],
            i2c_users: 0,
            spi_users: 0,
        }
    }

    pub fn board(&self) -> &'static Board {
        self.board
    }

    /// Look a port up by its board-facing number.
    pub fn port_by_num(&self, num: u8) -> Option<&'static Port> {
        self.board.ports.iter().find(|p| p.num == num)
    }

    /// Index of a port inside the table.
    fn index_of(&self, port: &Port) -> Option<usize> {
        self.board.ports.iter().position(|p| p.num == port.num)
    }

    /// Current owner of a port, if any.
    pub fn owner(&self, port: &Port) -> Option<InterfaceKind> {
        self.index_of(port).and_then(|i| self.owners[i])
    }

    /// Mark `port` as owned by `owner`. Locking a port already owned by a
    /// *different* interface is a logic error in the caller; the registry
    /// records the new owner regardless (matching unconditional-overwrite
    /// semantics) but logs it.
    pub fn lock(&mut self, port: &Port, owner: InterfaceKind) {
        if let Some(i) = self.index_of(port) {
            if let Some(prev) = self.owners[i] {
                if prev != owner {
                    debug!(
                        "port {} relocked {} -> {}",
                        port.num,
                        prev.name(),
                        owner.name()
                    );
                }
            }
            self.owners[i] = Some(owner);
        }
    }

    /// Clear ownership of a port unconditionally.
    pub fn unlock(&mut self, port: &Port) {
        if let Some(i) = self.index_of(port) {
            self.owners[i] = None;
        }
    }

    /// Whether `port` can be claimed by `kind` right now. `extra` names a
    /// port that should count as available even though it is locked — the
    /// port currently assigned to the sensor being edited.
    pub fn usable_by(&self, kind: InterfaceKind, port: &Port, extra: Option<u8>) -> bool {
        if extra == Some(port.num) {
            return true;
        }
        match self.owner(port) {
            None => true,
            // Multi-drop: several one-wire sensors may share a port.
            Some(owner) => kind == InterfaceKind::OneWire && owner == InterfaceKind::OneWire,
        }
    }

    /// Number of ports `kind` could be attached to. I2C has fixed,
    /// non-enumerable lines, so its count is always zero; use
    /// [`GpioRegistry::i2c_bus_free`] instead.
    pub fn available_count(&self, kind: InterfaceKind, extra: Option<u8>) -> usize {
        if kind == InterfaceKind::I2c {
            return 0;
        }
        self.board
            .ports
            .iter()
            .filter(|p| self.usable_by(kind, p, extra))
            .count()
    }

    /// The `index`-th port usable by `kind` (UI list enumeration).
    pub fn available_port(
        &self,
        kind: InterfaceKind,
        index: usize,
        extra: Option<u8>,
    ) -> Option<&'static Port> {
        if kind == InterfaceKind::I2c {
            return None;
        }
        self.board
            .ports
            .iter()
            .filter(|p| self.usable_by(kind, p, extra))
            .nth(index)
    }

    /// Whether both fixed I2C lines are free or already carrying I2C.
    pub fn i2c_bus_free(&self) -> bool {
        self.board.i2c_ports.iter().all(|&num| {
            self.port_by_num(num).is_some_and(|p| {
                matches!(self.owner(p), None | Some(InterfaceKind::I2c))
            })
        })
    }

    /// Whether all three fixed SPI lines are free or already carrying SPI.
    pub fn spi_bus_free(&self) -> bool {
        self.board.spi_ports.iter().all(|&num| {
            self.port_by_num(num).is_some_and(|p| {
                matches!(self.owner(p), None | Some(InterfaceKind::Spi))
            })
        })
    }

    /// Register one more I2C sensor; locks the fixed lines on the first.
    pub fn i2c_attach(&mut self) {
        self.i2c_users += 1;
        if self.i2c_users == 1 {
            for num in self.board.i2c_ports {
                if let Some(p) = self.port_by_num(num) {
                    self.lock(p, InterfaceKind::I2c);
                }
            }
        }
    }

    /// Drop one I2C sensor; unlocks the fixed lines after the last.
    pub fn i2c_detach(&mut self) {
        self.i2c_users = self.i2c_users.saturating_sub(1);
        if self.i2c_users == 0 {
            for num in self.board.i2c_ports {
                if let Some(p) = self.port_by_num(num) {
                    self.unlock(p);
                }
            }
        }
    }

    /// Register one more SPI sensor; locks the shared lines on the first.
    pub fn spi_attach(&mut self) {
        self.spi_users += 1;
        if self.spi_users == 1 {
            for num in self.board.spi_ports {
                if let Some(p) = self.port_by_num(num) {
                    self.lock(p, InterfaceKind::Spi);
                }
            }
        }
    }

    /// Drop one SPI sensor; unlocks the shared lines after the last.
    /// Returns `true` when this was the last user.
    pub fn spi_detach(&mut self) -> bool {
        self.spi_users = self.spi_users.saturating_sub(1);
        if self.spi_users == 0 {
            for num in self.board.spi_ports {
                if let Some(p) = self.port_by_num(num) {
                    self.unlock(p);
                }
            }
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> GpioRegistry {
        GpioRegistry::new(&DEFAULT_BOARD)
    }

    #[test]
    fn lock_unlock_roundtrip() {
        let mut g = registry();
        let port = g.port_by_num(2).unwrap();
        g.lock(port, InterfaceKind::SingleWire);
        assert_eq!(g.owner(port), Some(InterfaceKind::SingleWire));
        g.unlock(port);
        assert_eq!(g.owner(port), None);
    }

    #[test]
    fn multi_drop_counts_ports_owned_by_same_kind() {
        let mut g = registry();
        let free = g.available_count(InterfaceKind::OneWire, None);
        let port = g.port_by_num(17).unwrap();
        g.lock(port, InterfaceKind::OneWire);
        // Still usable by one-wire: count unchanged.
        assert_eq!(g.available_count(InterfaceKind::OneWire, None), free);
        // But gone for single-wire.
        assert_eq!(
            g.available_count(InterfaceKind::SingleWire, None),
            free - 1
        );
    }

    #[test]
    fn extra_port_stays_visible_while_editing() {
        let mut g = registry();
        let port = g.port_by_num(4).unwrap();
        g.lock(port, InterfaceKind::SingleWire);
        let without = g.available_count(InterfaceKind::SingleWire, None);
        let with = g.available_count(InterfaceKind::SingleWire, Some(4));
        assert_eq!(with, without + 1);
        assert!(
            (0..with)
                .filter_map(|i| g.available_port(InterfaceKind::SingleWire, i, Some(4)))
                .any(|p| p.num == 4)
        );
    }

    #[test]
    fn i2c_is_not_enumerable() {
        let g = registry();
        assert_eq!(g.available_count(InterfaceKind::I2c, None), 0);
        assert!(g.available_port(InterfaceKind::I2c, 0, None).is_none());
        assert!(g.i2c_bus_free());
    }

    #[test]
    fn i2c_bus_blocked_by_foreign_owner() {
        let mut g = registry();
        let sda = g.port_by_num(DEFAULT_BOARD.i2c_ports[0]).unwrap();
        g.lock(sda, InterfaceKind::SingleWire);
        assert!(!g.i2c_bus_free());
    }

    #[test]
    fn all_ports_owned_leaves_nothing_for_single_wire() {
        let mut g = registry();
        for port in DEFAULT_BOARD.ports {
            g.lock(port, InterfaceKind::I2c);
        }
        assert_eq!(g.available_count(InterfaceKind::SingleWire, None), 0);
        assert!(g.available_port(InterfaceKind::SingleWire, 0, None).is_none());
    }

    #[test]
    fn i2c_refcount_locks_on_first_unlocks_on_last() {
        let mut g = registry();
        let sda = g.port_by_num(DEFAULT_BOARD.i2c_ports[0]).unwrap();
        g.i2c_attach();
        g.i2c_attach();
        assert_eq!(g.owner(sda), Some(InterfaceKind::I2c));
        g.i2c_detach();
        assert_eq!(g.owner(sda), Some(InterfaceKind::I2c));
        g.i2c_detach();
        assert_eq!(g.owner(sda), None);
    }
}
