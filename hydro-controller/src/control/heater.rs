use super::{Channel, ChannelState, ControlPolicy, TickInputs};
use crate::config::valid_setpoint;

/// Half-width of the heater band around the setpoint, °C.
pub const HYSTERESIS_C: f32 = 0.5;

/// Water heater with a hysteresis band.
///
/// Turns on below `setpoint - 0.5` and stays on until the water reaches
/// `setpoint + 0.5`.
#[derive(Debug, Clone)]
pub struct Heater {
    setpoint_c: f32,
    state: ChannelState,
}

impl Heater {
    /// Heater regulating to `setpoint_c`.
    pub fn new(setpoint_c: f32) -> Self {
        Self {
            setpoint_c,
            state: ChannelState::default(),
        }
    }

    /// Target water temperature, °C.
    pub fn setpoint(&self) -> f32 {
        self.setpoint_c
    }

    /// Replace the setpoint; rejected outside (-40, 80) °C.
    pub fn set_setpoint(&mut self, celsius: f32) -> bool {
        if !valid_setpoint(celsius) {
            return false;
        }
        self.setpoint_c = celsius;
        true
    }
}

impl ControlPolicy for Heater {
    fn channel(&self) -> Channel {
        Channel::Heater
    }

    fn tick(&mut self, inputs: &TickInputs) -> Option<bool> {
        let t = inputs.water_temperature?;
        let on = if self.state.is_on {
            t < self.setpoint_c + HYSTERESIS_C
        } else {
            t < self.setpoint_c - HYSTERESIS_C
        };
        self.state.drive(on, inputs.now_secs)
    }

    fn reset(&mut self) {
        self.state = ChannelState::default();
    }

    fn state(&self) -> &ChannelState {
        &self.state
    }
}
