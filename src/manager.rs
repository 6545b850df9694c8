//! Sensor instance manager: owns the live sensor list, the pin registry
//! and the tick-driven polling loop.
//!
//! `tick()` is the single resume point for every multi-step conversion:
//! each active sensor whose minimum interval has elapsed gets one
//! interface update, and the returned status is stored back on the
//! instance. Early polls are *returned* to the caller but never stored,
//! so an in-flight `Polling` state survives interval gating.

use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::gpio::{Board, GpioRegistry, Port};
use crate::hal::Platform;
use crate::interfaces::{self, one_wire::RomId, BusInstance, InterfaceKind};
use crate::sensors::{PollStatus, Quantities, Readings, Sensor, SensorType, NO_DATA};
use crate::units::{convert_pressure, convert_temp};

/// Backdate applied to a new sensor's poll clock so its first tick is
/// eligible immediately.
const FIRST_POLL_BACKDATE_MS: u32 = 10_000;

pub struct SensorManager<P: Platform> {
    platform: P,
    gpio: GpioRegistry,
    sensors: Vec<Sensor>,
    settings: Settings,
    /// Set between `init_all` and `deinit_all`; newly created sensors
    /// are brought up immediately while it holds.
    ready: bool,
}

impl<P: Platform> SensorManager<P> {
    pub fn new(platform: P, board: &'static Board, settings: Settings) -> Self {
        Self {
            platform,
            gpio: GpioRegistry::new(board),
            sensors: Vec::new(),
            settings,
            ready: false,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor(&self, index: usize) -> Option<&Sensor> {
        self.sensors.get(index)
    }

    // ── creation / destruction ────────────────────────────────

    /// Create a sensor from its catalog descriptor and the textual bus
    /// arguments. On any failure every partially claimed resource is
    /// released and no instance is added.
    pub fn create(
        &mut self,
        name: &str,
        ty: &'static SensorType,
        temp_offset_tenths: i16,
        args: &str,
    ) -> Result<usize> {
        if name.trim().is_empty() {
            return Err(Error::NameInvalid);
        }
        let instance = interfaces::alloc(&mut self.gpio, &self.sensors, ty, args)?;
        let now = self.platform.now_ms();
        let mut sensor = Sensor {
            name: Sensor::bounded_name(name.trim()),
            ty,
            status: PollStatus::Error,
            initialized: false,
            last_poll_ms: now.wrapping_sub(FIRST_POLL_BACKDATE_MS),
            readings: Readings::default(),
            temp_offset_tenths,
            instance,
        };
        if self.ready && !interfaces::init(&self.platform, &mut self.gpio, &mut sensor) {
            warn!("init failed for new sensor {}", sensor.name);
        }
        info!("created sensor {} ({})", sensor.name, ty.name);
        self.sensors.push(sensor);
        Ok(self.sensors.len() - 1)
    }

    /// Deinitialize, release and drop one sensor.
    pub fn destroy(&mut self, index: usize) -> Result<()> {
        if index >= self.sensors.len() {
            return Err(Error::Args("no such sensor"));
        }
        let mut sensor = self.sensors.remove(index);
        if self.ready {
            interfaces::deinit(&self.platform, &mut self.gpio, &mut sensor);
        }
        interfaces::free(&mut self.gpio, &sensor);
        info!("destroyed sensor {}", sensor.name);
        Ok(())
    }

    // ── bring-up / teardown ───────────────────────────────────

    /// Bring every active sensor's bus up. Remembers whether the
    /// auxiliary rail was already on so teardown can leave it alone.
    pub fn init_all(&mut self) {
        self.settings.aux_power_was_on = self.platform.aux_power_enabled();
        for sensor in &mut self.sensors {
            if sensor.is_active() && !interfaces::init(&self.platform, &mut self.gpio, sensor) {
                debug!("bring-up failed for {}", sensor.name);
            }
        }
        self.ready = true;
    }

    /// Tear every sensor's bus down and (unless it was on before us)
    /// switch the auxiliary rail off.
    pub fn deinit_all(&mut self) {
        for sensor in &mut self.sensors {
            interfaces::deinit(&self.platform, &mut self.gpio, sensor);
        }
        if !self.settings.aux_power_was_on {
            self.platform.aux_power_disable();
        }
        self.ready = false;
    }

    // ── scheduling ────────────────────────────────────────────

    /// One scheduler pass over all active sensors, in list order.
    pub fn tick(&mut self) {
        for index in 0..self.sensors.len() {
            if self.sensors[index].is_active() {
                self.update_sensor(index);
            }
        }
    }

    /// Poll one sensor, honoring its minimum interval. The deferral
    /// statuses (`EarlyPoll`, and `Timeout` for a sensor already in
    /// fault) are returned without being stored.
    pub fn update_sensor(&mut self, index: usize) -> PollStatus {
        let now = self.platform.now_ms();
        let sensor = &mut self.sensors[index];
        if now.wrapping_sub(sensor.last_poll_ms) < sensor.ty.poll_interval_ms {
            return if sensor.status == PollStatus::Timeout {
                PollStatus::Timeout
            } else {
                PollStatus::EarlyPoll
            };
        }
        sensor.last_poll_ms = now;
        if !self.platform.aux_power_enabled() {
            self.platform.aux_power_enable();
        }

        let outcome = interfaces::update(&self.platform, sensor);
        sensor.status = outcome.status;
        if outcome.status == PollStatus::Ok {
            Self::postprocess(sensor, &self.settings);
        }
        if outcome.broadcast {
            self.mark_bus_siblings(index);
        }
        outcome.status
    }

    /// Trim offset first, then display-unit conversions, on a fresh
    /// reading only (stored raw values are overwritten each `Ok`).
    fn postprocess(sensor: &mut Sensor, settings: &Settings) {
        let r = &mut sensor.readings;
        r.temp += f32::from(sensor.temp_offset_tenths) / 10.0;
        r.temp = convert_temp(r.temp, settings.temp_unit);
        if sensor.ty.quantities.has(Quantities::PRESSURE) && r.pressure != NO_DATA {
            r.pressure = convert_pressure(r.pressure, settings.pressure_unit);
        }
    }

    /// A broadcast conversion covers every device on the same bus; mark
    /// the siblings so their own turn does not re-trigger it.
    fn mark_bus_siblings(&mut self, index: usize) {
        let BusInstance::OneWire { bus, .. } = &self.sensors[index].instance else {
            return;
        };
        let bus = Rc::clone(bus);
        for (j, other) in self.sensors.iter_mut().enumerate() {
            if j == index || !other.is_active() {
                continue;
            }
            if let BusInstance::OneWire { bus: other_bus, .. } = &other.instance {
                if Rc::ptr_eq(&bus, other_bus) {
                    other.status = PollStatus::EarlyPoll;
                }
            }
        }
    }

    // ── editing ───────────────────────────────────────────────

    /// Include/exclude a sensor from active iteration. Reactivation
    /// resets the status so the next tick re-validates the device.
    pub fn set_active(&mut self, index: usize, active: bool) {
        if let Some(sensor) = self.sensors.get_mut(index) {
            sensor.status = if active {
                PollStatus::Error
            } else {
                PollStatus::Inactive
            };
        }
    }

    pub fn active_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_active()).count()
    }

    /// The `index`-th active sensor.
    pub fn active(&self, index: usize) -> Option<&Sensor> {
        self.sensors.iter().filter(|s| s.is_active()).nth(index)
    }

    pub fn rename(&mut self, index: usize, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::NameInvalid);
        }
        let sensor = self
            .sensors
            .get_mut(index)
            .ok_or(Error::Args("no such sensor"))?;
        sensor.name = Sensor::bounded_name(name.trim());
        Ok(())
    }

    pub fn set_temp_offset(&mut self, index: usize, tenths: i16) {
        if let Some(sensor) = self.sensors.get_mut(index) {
            sensor.temp_offset_tenths = tenths;
        }
    }

    // ── availability queries (UI collaborator) ────────────────

    pub fn available_port_count(&self, kind: InterfaceKind, extra: Option<u8>) -> usize {
        self.gpio.available_count(kind, extra)
    }

    pub fn available_port(
        &self,
        kind: InterfaceKind,
        index: usize,
        extra: Option<u8>,
    ) -> Option<&'static Port> {
        self.gpio.available_port(kind, index, extra)
    }

    pub fn i2c_bus_free(&self) -> bool {
        self.gpio.i2c_bus_free()
    }

    pub fn spi_bus_free(&self) -> bool {
        self.gpio.spi_bus_free()
    }

    // ── one-wire discovery ────────────────────────────────────

    /// Enumerate unclaimed device ids on a port. Uses the existing
    /// shared bus when sensors already live there, or configures the pin
    /// transiently when none do.
    pub fn onewire_search(&mut self, port_num: u8) -> Result<Vec<RomId>> {
        let port = self.gpio.port_by_num(port_num).ok_or(Error::UnknownPort)?;
        let claimed: Vec<RomId> = self
            .sensors
            .iter()
            .filter_map(|s| match &s.instance {
                BusInstance::OneWire { bus, id }
                    if bus.borrow().port().num == port_num && s.is_active() =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .collect();

        let shared = self.sensors.iter().find_map(|s| match &s.instance {
            BusInstance::OneWire { bus, .. } if bus.borrow().port().num == port_num => {
                Some(Rc::clone(bus))
            }
            _ => None,
        });

        let mut found = Vec::new();
        match shared {
            Some(bus) => {
                let mut bus = bus.borrow_mut();
                bus.search_reset();
                while let Some(id) = bus.search_next(&self.platform) {
                    if !claimed.contains(&id) {
                        found.push(id);
                    }
                }
            }
            None => {
                if !self.gpio.usable_by(InterfaceKind::OneWire, port, None) {
                    return Err(Error::PortUnavailable);
                }
                let mut bus = interfaces::one_wire::OneWireBus::new(port);
                bus.init(&self.platform, &mut self.gpio);
                while let Some(id) = bus.search_next(&self.platform) {
                    if !claimed.contains(&id) {
                        found.push(id);
                    }
                }
                bus.deinit(&self.platform, &mut self.gpio);
            }
        }
        Ok(found)
    }

    // ── persistence collaborator ──────────────────────────────

    /// Serialize every sensor as one line of the store grammar.
    pub fn save_lines(&self) -> String {
        let mut out = String::new();
        for sensor in &self.sensors {
            out.push_str(&crate::store::format_line(sensor));
            out.push('\n');
        }
        out
    }

    /// Recreate sensors from stored lines. Malformed or unsatisfiable
    /// lines are skipped with a log entry; returns how many loaded.
    pub fn load_lines(&mut self, text: &str) -> usize {
        let mut loaded = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match crate::store::parse_line(line) {
                Ok(parsed) => {
                    match self.create(&parsed.name, parsed.ty, parsed.offset_tenths, &parsed.args)
                    {
                        Ok(_) => loaded += 1,
                        Err(err) => warn!("skipping stored sensor {}: {err}", parsed.name),
                    }
                }
                Err(err) => warn!("malformed sensor line ({err}): {line}"),
            }
        }
        loaded
    }
}
