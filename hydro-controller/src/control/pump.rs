use super::{Channel, ChannelState, ControlPolicy, TickInputs};
use crate::config::{
    ControllerConfig, valid_humidity_threshold, valid_max_off, valid_min_off, valid_min_run,
    valid_pump_timing,
};

/// Irrigation pump.
///
/// In timer mode the pump runs `on_time` out of every `period`. In humidity mode it runs
/// while the table humidity is below the threshold, bounded by a minimum run and a
/// minimum rest, and is forced on after resting for `max_off`. Without a valid humidity
/// reading, humidity mode falls back to the timer cycle.
#[derive(Debug, Clone)]
pub struct Pump {
    on_time: u32,
    period: u32,
    humidity_mode: bool,
    threshold: f32,
    min_run: u32,
    min_off: u32,
    max_off: u32,
    state: ChannelState,
}

impl Pump {
    /// Pump with the pump-related fields of `config`.
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            on_time: config.pump_on_sec,
            period: config.pump_period_sec,
            humidity_mode: config.humidity_mode,
            threshold: config.humidity_threshold,
            min_run: config.min_pump_run_sec,
            min_off: config.min_pump_off_sec,
            max_off: config.max_pump_off_sec,
            state: ChannelState::default(),
        }
    }

    /// Default settings with the pump fields filled in from this policy.
    pub fn config(&self) -> ControllerConfig {
        ControllerConfig {
            pump_on_sec: self.on_time,
            pump_period_sec: self.period,
            humidity_mode: self.humidity_mode,
            humidity_threshold: self.threshold,
            min_pump_run_sec: self.min_run,
            min_pump_off_sec: self.min_off,
            max_pump_off_sec: self.max_off,
            ..Default::default()
        }
    }

    /// Whether humidity mode is selected.
    pub fn humidity_mode(&self) -> bool {
        self.humidity_mode
    }

    /// Select humidity or timer mode. The channel is reset.
    pub fn set_humidity_mode(&mut self, enabled: bool) {
        self.humidity_mode = enabled;
        self.reset();
    }

    /// Replace the timer cycle; rejected unless `0 < on < period <= 7200`.
    pub fn set_timing(&mut self, on_sec: u32, period_sec: u32) -> bool {
        if !valid_pump_timing(on_sec, period_sec) {
            return false;
        }
        self.on_time = on_sec;
        self.period = period_sec;
        true
    }

    /// Replace the humidity threshold; rejected outside 0-100 %.
    pub fn set_humidity_threshold(&mut self, percent: f32) -> bool {
        if !valid_humidity_threshold(percent) {
            return false;
        }
        self.threshold = percent;
        true
    }

    /// Replace the minimum run; rejected outside 5-300 s.
    pub fn set_min_run(&mut self, seconds: u32) -> bool {
        if !valid_min_run(seconds) {
            return false;
        }
        self.min_run = seconds;
        true
    }

    /// Replace the minimum rest; rejected outside 60-3600 s.
    pub fn set_min_off(&mut self, seconds: u32) -> bool {
        if !valid_min_off(seconds) {
            return false;
        }
        self.min_off = seconds;
        true
    }

    /// Replace the maximum rest; rejected outside 300-7200 s.
    pub fn set_max_off(&mut self, seconds: u32) -> bool {
        if !valid_max_off(seconds) {
            return false;
        }
        self.max_off = seconds;
        true
    }

    fn timer_tick(&mut self, now: u32) -> Option<bool> {
        if !self.state.is_on {
            let next = *self.state.next_start_time.get_or_insert(now);
            if now >= next {
                return self.state.turn_on(now);
            }
        } else if now.wrapping_sub(self.state.on_start_time) >= self.on_time {
            let rest = self.period.saturating_sub(self.on_time);
            self.state.next_start_time = Some(now.saturating_add(rest));
            log::debug!("pump next start in {} s", rest);
            return self.state.turn_off(now);
        }
        None
    }

    fn humidity_tick(&mut self, now: u32, humidity: f32) -> Option<bool> {
        if !self.state.is_on {
            let off_since = *self.state.off_start_time.get_or_insert(now);
            let rested = self.state.next_start_time.is_none_or(|next| now >= next);
            let starved = now.wrapping_sub(off_since) >= self.max_off;
            if starved {
                log::warn!(
                    "pump forced on after {} s off ({:.1} %)",
                    now.wrapping_sub(off_since),
                    humidity
                );
                return self.state.turn_on(now);
            }
            if humidity < self.threshold && rested {
                return self.state.turn_on(now);
            }
        } else {
            let ran = now.wrapping_sub(self.state.on_start_time) >= self.min_run;
            if humidity >= self.threshold && ran {
                self.state.next_start_time = Some(now.saturating_add(self.min_off));
                return self.state.turn_off(now);
            }
        }
        None
    }
}

impl ControlPolicy for Pump {
    fn channel(&self) -> Channel {
        Channel::Pump
    }

    fn tick(&mut self, inputs: &TickInputs) -> Option<bool> {
        match (self.humidity_mode, inputs.table_humidity) {
            (true, Some(humidity)) => self.humidity_tick(inputs.now_secs, humidity),
            _ => self.timer_tick(inputs.now_secs),
        }
    }

    fn reset(&mut self) {
        self.state = ChannelState::default();
    }

    fn state(&self) -> &ChannelState {
        &self.state
    }
}
