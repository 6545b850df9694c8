//! Bus interface layer: one engine per physical bus kind plus the
//! dispatch seam the manager drives.
//!
//! Every sensor owns exactly one [`BusInstance`]; the four lifecycle
//! operations here (`alloc`/`init`/`deinit`/`update`/`free`) route to the
//! matching engine by instance kind and to the matching device model by
//! catalog tag. Engines talk to hardware only through the
//! [`Platform`](crate::hal::Platform) port and to pin ownership only
//! through the [`GpioRegistry`](crate::gpio::GpioRegistry).

pub mod i2c;
pub mod one_wire;
pub mod single_wire;
pub mod spi;

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::gpio::{GpioRegistry, Port};
use crate::hal::Platform;
use crate::sensors::{PollStatus, Sensor, SensorType};

use i2c::I2cInstance;
use one_wire::{OneWireBus, RomId};

/// The four supported bus kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    SingleWire,
    OneWire,
    I2c,
    Spi,
}

impl InterfaceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::SingleWire => "Single wire",
            Self::OneWire => "One wire",
            Self::I2c => "I2C",
            Self::Spi => "SPI",
        }
    }
}

/// Bus-specific state owned by one sensor.
pub enum BusInstance {
    /// Dedicated-pin timing-critical bus.
    SingleWire { port: &'static Port },
    /// Shared multi-drop bus; the bus object is shared between all
    /// sensors on the same port, the ROM id is this sensor's own.
    OneWire {
        bus: Rc<RefCell<OneWireBus>>,
        id: RomId,
    },
    /// Fixed-line two-wire bus; per-sensor address and model state.
    I2c(I2cInstance),
    /// Shared-line bus with a per-sensor chip-select port.
    Spi { cs: &'static Port },
}

impl BusInstance {
    pub fn kind(&self) -> InterfaceKind {
        match self {
            Self::SingleWire { .. } => InterfaceKind::SingleWire,
            Self::OneWire { .. } => InterfaceKind::OneWire,
            Self::I2c(_) => InterfaceKind::I2c,
            Self::Spi { .. } => InterfaceKind::Spi,
        }
    }

    /// The textual argument form accepted back by [`alloc`].
    pub fn args_string(&self) -> String {
        match self {
            Self::SingleWire { port } => format!("{}", port.num),
            Self::OneWire { bus, id } => {
                format!("{} {}", bus.borrow().port().num, one_wire::format_rom(id))
            }
            Self::I2c(inst) => format!("{:X}", inst.addr),
            Self::Spi { cs } => format!("{}", cs.num),
        }
    }
}

/// Result of one update pass over a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub status: PollStatus,
    /// Set when this update started a bus-wide conversion that siblings
    /// on the same shared bus must not duplicate this cycle.
    pub broadcast: bool,
}

impl UpdateOutcome {
    pub fn status(status: PollStatus) -> Self {
        Self {
            status,
            broadcast: false,
        }
    }
}

/// Parse textual arguments and claim the resources a new sensor needs.
/// Nothing touches hardware here; that is `init`'s job.
pub fn alloc(
    gpio: &mut GpioRegistry,
    existing: &[Sensor],
    ty: &'static SensorType,
    args: &str,
) -> Result<BusInstance> {
    match ty.interface {
        InterfaceKind::SingleWire => {
            let port = parse_port(gpio, args)?;
            if !gpio.usable_by(InterfaceKind::SingleWire, port, None) {
                return Err(Error::PortUnavailable);
            }
            gpio.lock(port, InterfaceKind::SingleWire);
            Ok(BusInstance::SingleWire { port })
        }
        InterfaceKind::OneWire => {
            let mut parts = args.split_whitespace();
            let port = parse_port(gpio, parts.next().unwrap_or(""))?;
            if !gpio.usable_by(InterfaceKind::OneWire, port, None) {
                return Err(Error::PortUnavailable);
            }
            let id = match parts.next() {
                Some(s) => one_wire::parse_rom(s).ok_or(Error::Args("bad ROM id"))?,
                // All-zero id: discover during init.
                None => RomId::default(),
            };
            let bus = find_one_wire_bus(existing, port)
                .unwrap_or_else(|| Rc::new(RefCell::new(OneWireBus::new(port))));
            Ok(BusInstance::OneWire { bus, id })
        }
        InterfaceKind::I2c => {
            // No explicit address configured: take the range minimum.
            let addr = match args.trim() {
                "" => ty.i2c_addr_min,
                s => u8::from_str_radix(s, 16).map_err(|_| Error::Args("bad I2C address"))?,
            };
            if addr < ty.i2c_addr_min || addr > ty.i2c_addr_max {
                return Err(Error::AddressOutOfRange);
            }
            if !gpio.i2c_bus_free() {
                return Err(Error::PortUnavailable);
            }
            gpio.i2c_attach();
            Ok(BusInstance::I2c(I2cInstance::new(addr, ty.model)))
        }
        InterfaceKind::Spi => {
            let cs = parse_port(gpio, args)?;
            if !gpio.spi_bus_free() || !gpio.usable_by(InterfaceKind::Spi, cs, None) {
                return Err(Error::PortUnavailable);
            }
            gpio.lock(cs, InterfaceKind::Spi);
            gpio.spi_attach();
            Ok(BusInstance::Spi { cs })
        }
    }
}

/// Shared one-wire bus lookup: any existing sensor already on `port`.
fn find_one_wire_bus(existing: &[Sensor], port: &'static Port) -> Option<Rc<RefCell<OneWireBus>>> {
    existing.iter().find_map(|s| match &s.instance {
        BusInstance::OneWire { bus, .. } if bus.borrow().port().num == port.num => {
            Some(Rc::clone(bus))
        }
        _ => None,
    })
}

fn parse_port(gpio: &GpioRegistry, arg: &str) -> Result<&'static Port> {
    let num: u8 = arg.trim().parse().map_err(|_| Error::Args("bad port"))?;
    gpio.port_by_num(num).ok_or(Error::UnknownPort)
}

/// Bring a sensor's bus and device up. Returns `false` on failure; the
/// caller records `Error` status but keeps the sensor. A failed
/// bring-up leaves the sensor marked uninitialized, so a later `deinit`
/// cannot detach it from a shared bus it never joined.
pub fn init(p: &dyn Platform, gpio: &mut GpioRegistry, sensor: &mut Sensor) -> bool {
    if sensor.initialized {
        return true;
    }
    let ok = match &mut sensor.instance {
        BusInstance::SingleWire { port } => {
            single_wire::init(p, port);
            true
        }
        BusInstance::OneWire { bus, id } => {
            let ok = {
                let mut bus = bus.borrow_mut();
                bus.init(p, gpio) && one_wire::sensor_init(p, &mut bus, id)
            };
            if !ok {
                warn!("one-wire init failed on port {}", bus.borrow().port().num);
                // Undo this sensor's own attach; siblings keep theirs.
                bus.borrow_mut().deinit(p, gpio);
            }
            ok
        }
        BusInstance::I2c(inst) => {
            let ok = i2c::sensor_init(p, inst);
            if !ok {
                debug!("i2c init failed at {:#04x}", inst.addr);
            }
            ok
        }
        BusInstance::Spi { cs } => {
            spi::init(p, cs);
            true
        }
    };
    sensor.initialized = ok;
    ok
}

/// Tear a sensor's device down (bus bookkeeping, released pins).
/// No-op unless the matching `init` succeeded.
pub fn deinit(p: &dyn Platform, gpio: &mut GpioRegistry, sensor: &mut Sensor) {
    if !sensor.initialized {
        return;
    }
    sensor.initialized = false;
    match &mut sensor.instance {
        BusInstance::SingleWire { port } => single_wire::deinit(p, port),
        BusInstance::OneWire { bus, .. } => bus.borrow_mut().deinit(p, gpio),
        BusInstance::I2c(_) => {}
        BusInstance::Spi { cs } => spi::deinit(p, cs),
    }
}

/// One polling pass over a sensor whose minimum interval has elapsed.
pub fn update(p: &dyn Platform, sensor: &mut Sensor) -> UpdateOutcome {
    let model = sensor.ty.model;
    let prev = sensor.status;
    match &mut sensor.instance {
        BusInstance::SingleWire { port } => UpdateOutcome::status(single_wire::update(
            p,
            port,
            model,
            &mut sensor.readings,
        )),
        BusInstance::OneWire { bus, id } => {
            one_wire::update(p, &mut bus.borrow_mut(), id, prev, &mut sensor.readings)
        }
        BusInstance::I2c(inst) => {
            UpdateOutcome::status(i2c::update(p, inst, prev, &mut sensor.readings))
        }
        BusInstance::Spi { cs } => {
            UpdateOutcome::status(spi::update(p, cs, model, &mut sensor.readings))
        }
    }
}

/// Release the resources `alloc` claimed. Idempotent per sensor: called
/// exactly once, on destruction.
pub fn free(gpio: &mut GpioRegistry, sensor: &Sensor) {
    match &sensor.instance {
        BusInstance::SingleWire { port } => gpio.unlock(port),
        // Bus pin ownership follows the init refcount; dropping the Rc
        // reclaims the bus object itself once the last sensor goes.
        BusInstance::OneWire { .. } => {}
        BusInstance::I2c(_) => gpio.i2c_detach(),
        BusInstance::Spi { cs } => {
            gpio.unlock(cs);
            gpio.spi_detach();
        }
    }
}
