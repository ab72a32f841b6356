use crate::{Nrf24, Nrf24Result};
use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};

/// Address of a single-byte register in the nRF24L01 register map.
pub trait Addressing {
    /// Register address.
    const ADDR: u8;
}

/// Trait for reading and writing single-byte nRF24L01 registers.
pub trait Interact: Addressing + Copy + From<u8> + Into<u8> {
    /// Read the register value from the radio.
    fn read<SPI: SpiDevice, CE: OutputPin, D: DelayNs>(
        &mut self,
        dev: &mut Nrf24<SPI, CE, D>,
    ) -> Nrf24Result<(), SPI::Error, CE::Error> {
        *self = Self::from(dev.read_register(Self::ADDR)?);
        Ok(())
    }

    /// Write the register value to the radio.
    fn write<SPI: SpiDevice, CE: OutputPin, D: DelayNs>(
        &self,
        dev: &mut Nrf24<SPI, CE, D>,
    ) -> Nrf24Result<(), SPI::Error, CE::Error> {
        dev.write_register(Self::ADDR, (*self).into())?;
        Ok(())
    }
}
