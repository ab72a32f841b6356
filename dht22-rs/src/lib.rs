#![no_std]
//! # dht22
//! Driver for the DHT22 (AM2302) air temperature and humidity sensor.
//!
//! The sensor speaks a proprietary single-wire protocol: the host pulls the line low to
//! request a frame, the sensor acknowledges with an 80 µs low/high pair and then sends
//! 40 bits, each a ~50 µs low followed by a high whose length encodes the bit
//! (~27 µs for 0, ~70 µs for 1). Every edge wait is bounded, so a missing or stuck
//! sensor yields [`Dht22Error::Timeout`] instead of hanging the caller.
//!
//! The sensor needs 2 s between measurements; [`Dht22::read`] refuses earlier requests
//! with [`Dht22Error::TooSoon`] without touching the line.

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin, PinState},
};

const IDLE_HIGH_MS: u32 = 10;
const START_SIGNAL_LOW_MS: u32 = 2;
const BIT_SAMPLE_DELAY_US: u32 = 40;
const POLL_DELAY_US: u32 = 1;
const POWER_UP_MS: u32 = 250;

/// Default number of polls before an edge wait gives up.
pub const MAX_CYCLES: u32 = 200;

/// Minimum time between two measurements.
pub const MIN_READ_INTERVAL_MS: u32 = 2000;

/// A single humidity and temperature measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Relative humidity as a percentage (% RH).
    pub humidity: f32,
    /// Temperature in degrees Celsius (°C).
    pub temperature: f32,
}

impl Measurement {
    /// Decodes a 5-byte frame: humidity ×10 and signed-magnitude temperature ×10,
    /// both big-endian, followed by the 8-bit sum of the first four bytes.
    ///
    /// Returns [`None`] if the checksum does not match.
    pub fn from_frame(frame: &[u8; 5]) -> Option<Self> {
        let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if sum != frame[4] {
            return None;
        }
        let humidity = f32::from(u16::from_be_bytes([frame[0], frame[1]])) * 0.1;
        let magnitude = f32::from(u16::from_be_bytes([frame[2] & 0x7f, frame[3]])) * 0.1;
        let temperature = if frame[2] & 0x80 != 0 {
            -magnitude
        } else {
            magnitude
        };
        Some(Self {
            humidity,
            temperature,
        })
    }
}

/// Errors that may occur when interacting with the DHT22.
#[derive(Debug, PartialEq, Eq)]
pub enum Dht22Error<E> {
    /// GPIO pin errors.
    Pin(E),
    /// Data checksum mismatch.
    ChecksumMismatch,
    /// An edge did not arrive within the poll budget.
    Timeout,
    /// Less than [`MIN_READ_INTERVAL_MS`] has passed since the last successful read.
    TooSoon,
}

impl<E> From<E> for Dht22Error<E> {
    fn from(e: E) -> Self {
        Dht22Error::Pin(e)
    }
}

type PinError<P> = <P as ErrorType>::Error;

/// The DHT22 driver.
///
/// The pin must be open drain with a pull-up: `set_high` releases the line.
pub struct Dht22<P, D> {
    pin: P,
    delay: D,
    max_cycles: u32,
    last_read: Option<u32>,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Creates a [`Dht22`] driver for the given pin and delay provider.
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            max_cycles: MAX_CYCLES,
            last_read: None,
        }
    }

    /// Poll budget for each edge wait, see [`MAX_CYCLES`].
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles.max(1);
        self
    }

    /// Release the pin and delay provider.
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// Idles the line high and waits for the sensor to settle after power-up.
    pub fn begin(&mut self) -> Result<(), Dht22Error<PinError<P>>> {
        self.pin.set_high()?;
        self.delay.delay_ms(POWER_UP_MS);
        log::info!("DHT22 initialized");
        Ok(())
    }

    /// Reads a single humidity and temperature measurement.
    ///
    /// # Arguments
    /// * `now_ms` - Current time on a monotonic millisecond clock. Only successful reads
    ///   restart the minimum interval.
    ///
    /// # Errors
    /// [`Dht22Error::TooSoon`] within the minimum interval, [`Dht22Error::Timeout`] if the
    /// sensor does not answer, [`Dht22Error::ChecksumMismatch`] for a corrupted frame.
    pub fn read(&mut self, now_ms: u32) -> Result<Measurement, Dht22Error<PinError<P>>> {
        if let Some(last) = self.last_read {
            if now_ms.wrapping_sub(last) < MIN_READ_INTERVAL_MS {
                return Err(Dht22Error::TooSoon);
            }
        }
        let frame = self.read_frame()?;
        let measurement = Measurement::from_frame(&frame).ok_or(Dht22Error::ChecksumMismatch)?;
        self.last_read = Some(now_ms);
        log::debug!(
            "DHT22: {:.1} °C, {:.1} %RH",
            measurement.temperature,
            measurement.humidity
        );
        Ok(measurement)
    }

    fn read_frame(&mut self) -> Result<[u8; 5], Dht22Error<PinError<P>>> {
        self.pin.set_high()?;
        self.delay.delay_ms(IDLE_HIGH_MS);
        self.pin.set_low()?;
        self.delay.delay_ms(START_SIGNAL_LOW_MS);
        self.pin.set_high()?;

        // Acknowledge: sensor pulls low, then high, then low again to start the first bit.
        self.wait_until_state(PinState::Low)?;
        self.wait_until_state(PinState::High)?;
        self.wait_until_state(PinState::Low)?;

        let mut frame = [0u8; 5];
        for i in 0..40 {
            self.wait_until_state(PinState::High)?;
            self.delay.delay_us(BIT_SAMPLE_DELAY_US);
            frame[i / 8] <<= 1;
            if self.pin.is_high()? {
                frame[i / 8] |= 1;
            }
            self.wait_until_state(PinState::Low)?;
        }
        Ok(frame)
    }

    fn wait_until_state(&mut self, state: PinState) -> Result<(), Dht22Error<PinError<P>>> {
        for _ in 0..self.max_cycles {
            let reached = match state {
                PinState::High => self.pin.is_high()?,
                PinState::Low => self.pin.is_low()?,
            };
            if reached {
                return Ok(());
            }
            self.delay.delay_us(POLL_DELAY_US);
        }
        Err(Dht22Error::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern crate std;
    use std::{vec, vec::Vec};

    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    fn frame(humidity: u16, temperature: i16) -> [u8; 5] {
        let [h0, h1] = humidity.to_be_bytes();
        let [mut t0, t1] = temperature.unsigned_abs().to_be_bytes();
        if temperature < 0 {
            t0 |= 0x80;
        }
        [h0, h1, t0, t1, h0.wrapping_add(h1).wrapping_add(t0).wrapping_add(t1)]
    }

    fn start_signal() -> Vec<PinTransaction> {
        vec![
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
        ]
    }

    /// Pin activity of a complete exchange that delivers `frame`.
    fn waveform(frame: &[u8; 5]) -> Vec<PinTransaction> {
        let mut expectations = start_signal();
        expectations.extend([
            PinTransaction::get(State::Low),
            PinTransaction::get(State::High),
            PinTransaction::get(State::Low),
        ]);
        for i in 0..40 {
            let bit = frame[i / 8] >> (7 - i % 8) & 1 == 1;
            expectations.push(PinTransaction::get(State::High));
            expectations.push(PinTransaction::get(if bit { State::High } else { State::Low }));
            expectations.push(PinTransaction::get(State::Low));
        }
        expectations
    }

    #[test]
    fn decodes_positive_and_negative_frames() {
        let m = Measurement::from_frame(&[0x02, 0x58, 0x00, 0xfa, 0x54]).unwrap();
        assert!((m.humidity - 60.0).abs() < 1e-4);
        assert!((m.temperature - 25.0).abs() < 1e-4);

        let m = Measurement::from_frame(&frame(652, -101)).unwrap();
        assert!((m.humidity - 65.2).abs() < 1e-4);
        assert!((m.temperature + 10.1).abs() < 1e-4);
    }

    #[test]
    fn checksum_is_the_wrapping_sum() {
        assert!(Measurement::from_frame(&[0xff, 0xff, 0x01, 0x02, 0x01]).is_some());
        assert!(Measurement::from_frame(&[1, 2, 3, 4, 9]).is_none());
    }

    #[test]
    fn begin_idles_line_high() {
        let pin = PinMock::new(&[PinTransaction::set(State::High)]);
        let mut dht = Dht22::new(pin, NoopDelay::new());
        dht.begin().unwrap();
        dht.release().0.done();
    }

    #[test]
    fn reads_a_measurement() {
        let pin = PinMock::new(&waveform(&frame(455, 231)));
        let mut dht = Dht22::new(pin, NoopDelay::new());

        let m = dht.read(0).unwrap();
        assert!((m.humidity - 45.5).abs() < 1e-4);
        assert!((m.temperature - 23.1).abs() < 1e-4);
        dht.release().0.done();
    }

    #[test]
    fn corrupted_frame_is_rejected() {
        let mut bad = frame(455, 231);
        bad[4] ^= 0x10;
        let pin = PinMock::new(&waveform(&bad));
        let mut dht = Dht22::new(pin, NoopDelay::new());

        assert!(matches!(dht.read(0), Err(Dht22Error::ChecksumMismatch)));
        dht.release().0.done();
    }

    #[test]
    fn silent_sensor_times_out() {
        let mut expectations = start_signal();
        expectations.extend(vec![PinTransaction::get(State::High); 3]);
        let pin = PinMock::new(&expectations);
        let mut dht = Dht22::new(pin, NoopDelay::new()).with_max_cycles(3);

        assert!(matches!(dht.read(0), Err(Dht22Error::Timeout)));
        dht.release().0.done();
    }

    #[test]
    fn interval_only_advances_on_success() {
        let mut expectations = start_signal();
        expectations.extend(vec![PinTransaction::get(State::High); 3]);
        expectations.extend(waveform(&frame(500, 200)));
        let pin = PinMock::new(&expectations);
        let mut dht = Dht22::new(pin, NoopDelay::new()).with_max_cycles(3);

        assert!(matches!(dht.read(0), Err(Dht22Error::Timeout)));
        // The failed read did not start the interval.
        assert!(dht.read(10).is_ok());
        // Early requests never touch the pin.
        assert!(matches!(dht.read(1000), Err(Dht22Error::TooSoon)));
        assert!(matches!(dht.read(2009), Err(Dht22Error::TooSoon)));
        dht.release().0.done();
    }
}
