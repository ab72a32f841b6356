use super::{Channel, ChannelState, ControlPolicy, TickInputs};
use crate::config::valid_light_schedule;

/// Grow lights on a daily window.
///
/// On while the time of day is in `[start, end)`; a window with `end < start` runs
/// overnight. Without a wall clock the lights hold their state.
#[derive(Debug, Clone)]
pub struct Lights {
    start_s: u32,
    end_s: u32,
    state: ChannelState,
}

impl Lights {
    /// Lights on from `start_s` to `end_s`, seconds since midnight.
    pub fn new(start_s: u32, end_s: u32) -> Self {
        Self {
            start_s,
            end_s,
            state: ChannelState::default(),
        }
    }

    /// `(start, end)` in seconds since midnight.
    pub fn schedule(&self) -> (u32, u32) {
        (self.start_s, self.end_s)
    }

    /// Replace the window; rejected unless both bounds are within a day.
    pub fn set_schedule(&mut self, start_s: u32, end_s: u32) -> bool {
        if !valid_light_schedule(start_s, end_s) {
            return false;
        }
        self.start_s = start_s;
        self.end_s = end_s;
        true
    }

    /// Whether `time_of_day` falls in the window.
    pub fn in_window(&self, time_of_day: u32) -> bool {
        if self.start_s <= self.end_s {
            (self.start_s..self.end_s).contains(&time_of_day)
        } else {
            time_of_day >= self.start_s || time_of_day < self.end_s
        }
    }
}

impl ControlPolicy for Lights {
    fn channel(&self) -> Channel {
        Channel::Lights
    }

    fn tick(&mut self, inputs: &TickInputs) -> Option<bool> {
        let on = self.in_window(inputs.time_of_day?);
        self.state.drive(on, inputs.now_secs)
    }

    fn reset(&mut self) {
        self.state = ChannelState::default();
    }

    fn state(&self) -> &ChannelState {
        &self.state
    }
}
