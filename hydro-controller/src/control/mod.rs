//! Actuator control policies.
//!
//! Each relay channel is driven by one [`ControlPolicy`], a small state machine that
//! turns [`TickInputs`] into on/off transitions. The [`Controller`] owns the four
//! policies and their relays and writes a relay only when its policy reports a
//! transition.

mod fan;
mod heater;
mod lights;
mod pump;

pub use fan::{FAN_OFF_C, FAN_ON_C, Fan};
pub use heater::{HYSTERESIS_C, Heater};
pub use lights::Lights;
pub use pump::Pump;

use crate::{
    cache::{Quantity, SensorCache},
    config::ControllerConfig,
};
use embedded_hal::digital::OutputPin;
use std::sync::{Mutex, PoisonError};

/// Relay channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Grow lights.
    Lights,
    /// Irrigation pump.
    Pump,
    /// Water heater.
    Heater,
    /// Circulation fan.
    Fan,
}

impl Channel {
    /// Every channel, in relay order.
    pub const ALL: [Channel; 4] = [Channel::Lights, Channel::Pump, Channel::Heater, Channel::Fan];

    /// Short label used in logs and status reports.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Lights => "lights",
            Channel::Pump => "pump",
            Channel::Heater => "heater",
            Channel::Fan => "fan",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Timing state of a channel, in seconds on the monotonic control clock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    /// Relay energised.
    pub is_on: bool,
    /// When the channel last turned on.
    pub on_start_time: u32,
    /// Earliest next start, if scheduled.
    pub next_start_time: Option<u32>,
    /// When the channel last turned off, if it has been observed off.
    pub off_start_time: Option<u32>,
}

impl ChannelState {
    pub(crate) fn turn_on(&mut self, now: u32) -> Option<bool> {
        self.is_on = true;
        self.on_start_time = now;
        Some(true)
    }

    pub(crate) fn turn_off(&mut self, now: u32) -> Option<bool> {
        self.is_on = false;
        self.off_start_time = Some(now);
        Some(false)
    }

    /// Apply a desired state, reporting a transition if it differs.
    pub(crate) fn drive(&mut self, on: bool, now: u32) -> Option<bool> {
        match (self.is_on, on) {
            (false, true) => self.turn_on(now),
            (true, false) => self.turn_off(now),
            _ => None,
        }
    }
}

/// Everything a policy may look at during one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TickInputs {
    /// Monotonic control clock, seconds.
    pub now_secs: u32,
    /// Local wall-clock seconds since midnight, [`None`] until the clock is set.
    pub time_of_day: Option<u32>,
    /// Valid water temperature, °C.
    pub water_temperature: Option<f32>,
    /// Valid table humidity, %.
    pub table_humidity: Option<f32>,
}

impl TickInputs {
    /// Gather the readings the policies use from the cache.
    pub fn from_cache(cache: &SensorCache, now_secs: u32, time_of_day: Option<u32>) -> Self {
        let readings = cache.snapshot();
        Self {
            now_secs,
            time_of_day,
            water_temperature: readings.reading(Quantity::WaterTemperature),
            table_humidity: readings.reading(Quantity::TableHumidity),
        }
    }
}

/// A relay channel's control law.
pub trait ControlPolicy {
    /// Channel this policy drives.
    fn channel(&self) -> Channel;

    /// Advance the policy by one control tick.
    ///
    /// # Returns
    /// The new relay state on a transition, [`None`] if the relay keeps its state.
    fn tick(&mut self, inputs: &TickInputs) -> Option<bool>;

    /// Force the channel off and clear its timers.
    fn reset(&mut self);

    /// Current timing state.
    fn state(&self) -> &ChannelState;

    /// Whether the relay should be energised.
    fn is_on(&self) -> bool {
        self.state().is_on
    }
}

/// Relay coil drive level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Low energises the relay.
    #[default]
    ActiveLow,
    /// High energises the relay.
    ActiveHigh,
}

/// A relay on an output pin.
pub struct Relay<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap `pin`. The relay is not driven until the first [`set`](Relay::set).
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Energise or release the relay.
    pub fn set(&mut self, on: bool) -> Result<(), P::Error> {
        let high = match self.polarity {
            Polarity::ActiveHigh => on,
            Polarity::ActiveLow => !on,
        };
        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}

/// The four policies and their relays.
pub struct Controller<P> {
    lights: Lights,
    pump: Pump,
    heater: Heater,
    fan: Fan,
    relays: [Relay<P>; 4],
    dirty: bool,
}

impl<P: OutputPin> Controller<P> {
    /// Build the policies from `config`; `relays` are in [`Channel::ALL`] order.
    pub fn new(config: &ControllerConfig, relays: [Relay<P>; 4]) -> Self {
        Self {
            lights: Lights::new(config.lights_start_s, config.lights_end_s),
            pump: Pump::new(config),
            heater: Heater::new(config.heater_setpoint_c),
            fan: Fan::new(),
            relays,
            dirty: false,
        }
    }

    fn policy(&self, channel: Channel) -> &dyn ControlPolicy {
        match channel {
            Channel::Lights => &self.lights,
            Channel::Pump => &self.pump,
            Channel::Heater => &self.heater,
            Channel::Fan => &self.fan,
        }
    }

    fn policy_mut(&mut self, channel: Channel) -> &mut dyn ControlPolicy {
        match channel {
            Channel::Lights => &mut self.lights,
            Channel::Pump => &mut self.pump,
            Channel::Heater => &mut self.heater,
            Channel::Fan => &mut self.fan,
        }
    }

    fn write_relay(&mut self, channel: Channel, on: bool) -> Result<(), P::Error> {
        log::info!("{} {}", channel.name(), if on { "ON" } else { "OFF" });
        self.relays[channel.index()].set(on)
    }

    /// Reset every policy and release every relay.
    pub fn all_off(&mut self) -> Result<(), P::Error> {
        for channel in Channel::ALL {
            self.policy_mut(channel).reset();
            self.relays[channel.index()].set(false)?;
        }
        Ok(())
    }

    /// Run one control tick over all four channels.
    ///
    /// Each transition is written to its relay exactly once. A relay error does not
    /// stop the remaining channels; the first one is returned.
    pub fn tick(&mut self, inputs: &TickInputs) -> Result<(), P::Error> {
        let mut result = Ok(());
        for channel in Channel::ALL {
            if let Some(on) = self.policy_mut(channel).tick(inputs) {
                if let Err(e) = self.write_relay(channel, on) {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    /// Whether `channel`'s relay is energised.
    pub fn is_on(&self, channel: Channel) -> bool {
        self.policy(channel).is_on()
    }

    /// Timing state of `channel`.
    pub fn state(&self, channel: Channel) -> ChannelState {
        *self.policy(channel).state()
    }

    /// The settings currently in force.
    pub fn config(&self) -> ControllerConfig {
        let (lights_start_s, lights_end_s) = self.lights.schedule();
        let mut config = self.pump.config();
        config.lights_start_s = lights_start_s;
        config.lights_end_s = lights_end_s;
        config.heater_setpoint_c = self.heater.setpoint();
        config
    }

    /// Whether settings changed since the last [`take_dirty`](Controller::take_dirty).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The settings to persist, if they changed since the last call.
    pub fn take_dirty(&mut self) -> Option<ControllerConfig> {
        core::mem::take(&mut self.dirty).then(|| self.config())
    }

    fn accept(&mut self, accepted: bool) -> bool {
        self.dirty |= accepted;
        accepted
    }

    /// Lights policy.
    pub fn lights(&self) -> &Lights {
        &self.lights
    }

    /// Pump policy.
    pub fn pump(&self) -> &Pump {
        &self.pump
    }

    /// Heater policy.
    pub fn heater(&self) -> &Heater {
        &self.heater
    }

    /// Fan policy.
    pub fn fan(&self) -> &Fan {
        &self.fan
    }

    /// Set the lights window. Out-of-range values are rejected and `false` returned.
    pub fn set_light_schedule(&mut self, start_s: u32, end_s: u32) -> bool {
        let accepted = self.lights.set_schedule(start_s, end_s);
        self.accept(accepted)
    }

    /// Set the timer-mode pump cycle.
    pub fn set_pump_timing(&mut self, on_sec: u32, period_sec: u32) -> bool {
        let accepted = self.pump.set_timing(on_sec, period_sec);
        self.accept(accepted)
    }

    /// Switch the pump between timer and humidity mode.
    ///
    /// Switching resets the pump channel, releasing its relay.
    pub fn set_humidity_mode(&mut self, enabled: bool) -> Result<(), P::Error> {
        if self.pump.humidity_mode() == enabled {
            return Ok(());
        }
        self.pump.set_humidity_mode(enabled);
        self.dirty = true;
        log::info!("pump {} mode", if enabled { "humidity" } else { "timer" });
        self.relays[Channel::Pump.index()].set(false)
    }

    /// Set the humidity-mode threshold.
    pub fn set_humidity_threshold(&mut self, percent: f32) -> bool {
        let accepted = self.pump.set_humidity_threshold(percent);
        self.accept(accepted)
    }

    /// Set the humidity-mode minimum run.
    pub fn set_min_pump_run(&mut self, seconds: u32) -> bool {
        let accepted = self.pump.set_min_run(seconds);
        self.accept(accepted)
    }

    /// Set the humidity-mode minimum rest.
    pub fn set_min_pump_off(&mut self, seconds: u32) -> bool {
        let accepted = self.pump.set_min_off(seconds);
        self.accept(accepted)
    }

    /// Set the humidity-mode maximum rest.
    pub fn set_max_pump_off(&mut self, seconds: u32) -> bool {
        let accepted = self.pump.set_max_off(seconds);
        self.accept(accepted)
    }

    /// Set the heater setpoint.
    pub fn set_heater_setpoint(&mut self, celsius: f32) -> bool {
        let accepted = self.heater.set_setpoint(celsius);
        self.accept(accepted)
    }

    /// Switch the fan by hand.
    ///
    /// Only honoured while the water temperature is inside the fan's dead band.
    ///
    /// # Returns
    /// Whether the override was applied.
    pub fn set_fan_manual(
        &mut self,
        on: bool,
        water_temperature: Option<f32>,
        now_secs: u32,
    ) -> Result<bool, P::Error> {
        if !self.fan.set_manual(on, water_temperature, now_secs) {
            return Ok(false);
        }
        log::info!("fan {} (manual)", if on { "ON" } else { "OFF" });
        self.relays[Channel::Fan.index()].set(on)?;
        Ok(true)
    }
}

/// A [`Controller`] shared between the control tick and the reporting side.
///
/// Ticks and setters serialise on one lock, so configuration never changes mid-tick.
/// Relay writes happen under this lock; it is independent of the [`SensorCache`] lock,
/// so cache readers never wait on actuator I/O.
pub struct SharedController<P> {
    inner: Mutex<Controller<P>>,
}

impl<P: OutputPin> SharedController<P> {
    /// Share `controller`.
    pub fn new(controller: Controller<P>) -> Self {
        Self {
            inner: Mutex::new(controller),
        }
    }

    /// Run `f` with exclusive access to the controller.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Controller<P>) -> R) -> R {
        let mut controller = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut controller)
    }

    /// Tick with readings from `cache`.
    pub fn tick(
        &self,
        cache: &SensorCache,
        now_secs: u32,
        time_of_day: Option<u32>,
    ) -> Result<(), P::Error> {
        let inputs = TickInputs::from_cache(cache, now_secs, time_of_day);
        self.lock(|c| c.tick(&inputs))
    }

    /// Whether `channel`'s relay is energised.
    pub fn is_on(&self, channel: Channel) -> bool {
        self.lock(|c| c.is_on(channel))
    }

    /// The settings currently in force.
    pub fn config(&self) -> ControllerConfig {
        self.lock(|c| c.config())
    }

    /// See [`Controller::take_dirty`].
    pub fn take_dirty(&self) -> Option<ControllerConfig> {
        self.lock(|c| c.take_dirty())
    }

    /// See [`Controller::set_fan_manual`], using the cached water temperature.
    pub fn set_fan_manual(
        &self,
        cache: &SensorCache,
        on: bool,
        now_secs: u32,
    ) -> Result<bool, P::Error> {
        let temperature = cache.reading(Quantity::WaterTemperature);
        self.lock(|c| c.set_fan_manual(on, temperature, now_secs))
    }
}
