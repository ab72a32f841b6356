use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};

use crate::{OneWire, OneWireError, OneWireResult};

/// Slot timings of the bit-banged master, in microseconds.
///
/// The defaults are the standard-speed values from the DS18B20 datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitBangTiming {
    /// Duration the line is held low for the reset pulse.
    pub reset_low_us: u32,
    /// Delay between releasing the line and sampling the presence pulse.
    pub presence_sample_us: u32,
    /// Remainder of the reset time slot after sampling.
    pub reset_recovery_us: u32,
    /// Low time of a write-1 slot.
    pub write_1_low_us: u32,
    /// Recovery time of a write-1 slot.
    pub write_1_high_us: u32,
    /// Low time of a write-0 slot.
    pub write_0_low_us: u32,
    /// Recovery time of a write-0 slot.
    pub write_0_high_us: u32,
    /// Low time that opens a read slot.
    pub read_init_low_us: u32,
    /// Delay between releasing the line and sampling it.
    pub read_sample_us: u32,
    /// Remainder of the read slot after sampling.
    pub read_recovery_us: u32,
}

impl Default for BitBangTiming {
    fn default() -> Self {
        Self {
            reset_low_us: 480,
            presence_sample_us: 70,
            reset_recovery_us: 410,
            write_1_low_us: 6,
            write_1_high_us: 64,
            write_0_low_us: 60,
            write_0_high_us: 10,
            read_init_low_us: 6,
            read_sample_us: 9,
            read_recovery_us: 55,
        }
    }
}

const WAIT_HIGH_STEP_US: u32 = 2;

/// 1-Wire master driving a single open-drain GPIO.
///
/// The pin must be configured as open drain with an external pull-up:
/// `set_high` releases the line and `set_low` pulls it to ground.
pub struct BitBangOneWire<P, D> {
    pin: P,
    delay: D,
    timing: BitBangTiming,
    retries: u8,
}

impl<P, D> BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Creates a new bus master on the given pin.
    ///
    /// # Arguments
    /// * `pin` - Open-drain data line.
    /// * `delay` - Microsecond delay provider.
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            timing: BitBangTiming::default(),
            retries: 125,
        }
    }

    /// Number of 2 µs polls to wait for the line to float high before a reset.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Replace the slot timings.
    pub fn with_timing(mut self, timing: BitBangTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Release the pin and delay provider.
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    fn wait_for_high(&mut self) -> OneWireResult<(), <P as ErrorType>::Error> {
        for _ in 0..self.retries {
            if self.pin.is_high()? {
                return Ok(());
            }
            self.delay.delay_us(WAIT_HIGH_STEP_US);
        }
        log::warn!("1-Wire line held low");
        Err(OneWireError::BusStuckLow)
    }
}

impl<P, D> OneWire for BitBangOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    type BusError = <P as ErrorType>::Error;

    fn reset(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.pin.set_high()?;
        self.wait_for_high()?;

        self.pin.set_low()?;
        self.delay.delay_us(self.timing.reset_low_us);
        self.pin.set_high()?;
        self.delay.delay_us(self.timing.presence_sample_us);

        // Any device on the bus answers by holding the line low.
        let present = self.pin.is_low()?;
        self.delay.delay_us(self.timing.reset_recovery_us);
        Ok(present)
    }

    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
        let (low, high) = if bit {
            (self.timing.write_1_low_us, self.timing.write_1_high_us)
        } else {
            (self.timing.write_0_low_us, self.timing.write_0_high_us)
        };
        self.pin.set_low()?;
        self.delay.delay_us(low);
        self.pin.set_high()?;
        self.delay.delay_us(high);
        Ok(())
    }

    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
        self.pin.set_low()?;
        self.delay.delay_us(self.timing.read_init_low_us);
        self.pin.set_high()?;
        self.delay.delay_us(self.timing.read_sample_us);
        let bit = self.pin.is_high()?;
        self.delay.delay_us(self.timing.read_recovery_us);
        Ok(bit)
    }
}
