//! Sensirion SHT30 humidity and temperature sensor over I2C.

use crate::sources::Climate;
use embedded_hal::{delay::DelayNs, i2c::I2c};

/// Default I2C address (ADDR pin low).
pub const SHT30_ADDRESS: u8 = 0x44;

const CMD_MEASURE_HIGH: u16 = 0x2400;
const CMD_SOFT_RESET: u16 = 0x30a2;
const CMD_STATUS: u16 = 0xf32d;
const MEASURE_HIGH_MS: u32 = 15;
const RESET_MS: u32 = 2;
const STARTUP_MS: u32 = 100;

/// Errors that may occur when interacting with the SHT30.
#[derive(Debug, PartialEq, Eq)]
pub enum Sht30Error<E> {
    /// I2C bus errors.
    I2c(E),
    /// A data word failed its CRC.
    Crc,
}

impl<E> From<E> for Sht30Error<E> {
    fn from(e: E) -> Self {
        Sht30Error::I2c(e)
    }
}

/// CRC-8 over a data word: polynomial 0x31, initial value 0xff.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0xffu8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn checked_word(chunk: &[u8]) -> Option<u16> {
    (crc8(&chunk[..2]) == chunk[2]).then(|| u16::from_be_bytes([chunk[0], chunk[1]]))
}

/// The SHT30 driver, single-shot high repeatability measurements.
pub struct Sht30<I, D> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Sht30<I, D> {
    /// Creates a driver at [`SHT30_ADDRESS`].
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: SHT30_ADDRESS,
        }
    }

    /// Use a different I2C address (0x45 with ADDR high).
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    fn command(&mut self, cmd: u16) -> Result<(), Sht30Error<I::Error>> {
        self.i2c.write(self.address, &cmd.to_be_bytes())?;
        Ok(())
    }

    /// Checks that the sensor answers and soft-resets it.
    pub fn begin(&mut self) -> Result<(), Sht30Error<I::Error>> {
        self.delay.delay_ms(STARTUP_MS);
        self.command(CMD_STATUS)?;
        let mut status = [0; 3];
        self.i2c.read(self.address, &mut status)?;
        checked_word(&status).ok_or(Sht30Error::Crc)?;
        self.command(CMD_SOFT_RESET)?;
        self.delay.delay_ms(RESET_MS);
        log::info!("SHT30 found at {:#04x}", self.address);
        Ok(())
    }

    /// Runs one measurement.
    pub fn measure(&mut self) -> Result<Climate, Sht30Error<I::Error>> {
        self.command(CMD_MEASURE_HIGH)?;
        self.delay.delay_ms(MEASURE_HIGH_MS);
        let mut data = [0; 6];
        self.i2c.read(self.address, &mut data)?;
        let raw_t = checked_word(&data[..3]).ok_or(Sht30Error::Crc)?;
        let raw_h = checked_word(&data[3..]).ok_or(Sht30Error::Crc)?;
        Ok(Climate {
            temperature: -45.0 + 175.0 * raw_t as f32 / 65535.0,
            humidity: 100.0 * raw_h as f32 / 65535.0,
        })
    }
}
