use super::{Channel, ChannelState, ControlPolicy, TickInputs};

/// Water temperature at or above which the fan is forced on, °C.
pub const FAN_ON_C: f32 = 24.0;
/// Water temperature at or below which the fan is forced off, °C.
pub const FAN_OFF_C: f32 = 15.0;

/// Circulation fan.
///
/// Forced on at [`FAN_ON_C`] and off at [`FAN_OFF_C`]; in between the fan keeps its
/// state and may be switched by hand.
#[derive(Debug, Clone, Default)]
pub struct Fan {
    manual: bool,
    state: ChannelState,
}

impl Fan {
    /// Fan starting off, in automatic control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current state was set by hand.
    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Switch the fan by hand; ignored unless `temperature` is valid and inside
    /// `[FAN_OFF_C, FAN_ON_C]`.
    pub fn set_manual(&mut self, on: bool, temperature: Option<f32>, now: u32) -> bool {
        match temperature {
            Some(t) if (FAN_OFF_C..=FAN_ON_C).contains(&t) => {
                self.state.drive(on, now);
                self.manual = true;
                true
            }
            _ => false,
        }
    }
}

impl ControlPolicy for Fan {
    fn channel(&self) -> Channel {
        Channel::Fan
    }

    fn tick(&mut self, inputs: &TickInputs) -> Option<bool> {
        let t = inputs.water_temperature?;
        let on = if t >= FAN_ON_C {
            true
        } else if t <= FAN_OFF_C {
            false
        } else {
            return None;
        };
        let transition = self.state.drive(on, inputs.now_secs);
        if transition.is_some() {
            self.manual = false;
        }
        transition
    }

    fn reset(&mut self) {
        self.state = ChannelState::default();
        self.manual = false;
    }

    fn state(&self) -> &ChannelState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water(t: f32) -> TickInputs {
        TickInputs {
            water_temperature: Some(t),
            ..Default::default()
        }
    }

    #[test]
    fn hard_thresholds() {
        let mut fan = Fan::new();
        assert_eq!(fan.tick(&water(23.9)), None);
        assert_eq!(fan.tick(&water(24.0)), Some(true));
        assert_eq!(fan.tick(&water(20.0)), None);
        assert!(fan.is_on());
        assert_eq!(fan.tick(&water(15.0)), Some(false));
        assert_eq!(fan.tick(&TickInputs::default()), None);
    }

    #[test]
    fn manual_only_in_dead_band() {
        let mut fan = Fan::new();
        assert!(!fan.set_manual(true, None, 0));
        assert!(!fan.set_manual(true, Some(14.9), 0));
        assert!(!fan.set_manual(true, Some(24.1), 0));
        assert!(!fan.is_on());

        assert!(fan.set_manual(true, Some(20.0), 0));
        assert!(fan.is_on());
        assert!(fan.is_manual());
        assert_eq!(fan.tick(&water(20.0)), None);
        assert!(fan.is_on());
    }

    #[test]
    fn automatic_transition_clears_manual() {
        let mut fan = Fan::new();
        assert!(fan.set_manual(true, Some(18.0), 0));
        assert_eq!(fan.tick(&water(14.0)), Some(false));
        assert!(!fan.is_manual());

        assert!(fan.set_manual(false, Some(18.0), 0));
        assert!(fan.is_manual());
        // Already off, so no transition and the flag stays.
        assert_eq!(fan.tick(&water(10.0)), None);
        assert!(fan.is_manual());
    }
}
