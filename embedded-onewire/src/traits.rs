use crate::{
    ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SKIP_ROM_CMD, OneWireError, OneWireResult, Rom,
};

/// Trait for 1-Wire communication.
///
/// Implementors provide the reset/presence cycle and single bit time slots; byte
/// transfers and ROM addressing are built on top of them. Bytes travel least
/// significant bit first.
pub trait OneWire {
    /// The error type returned by the operations of this trait.
    /// This type is used to indicate errors in the underlying hardware or communication.
    type BusError: core::fmt::Debug;

    /// Resets the 1-Wire bus and samples the presence pulse.
    ///
    /// # Returns
    /// `true` if at least one device answered with a presence pulse. A missing
    /// presence pulse is not an error; the caller decides whether to retry or
    /// report the device as disconnected.
    ///
    /// # Errors
    /// This method returns an error if the line cannot be driven or sampled.
    fn reset(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a single bit to the 1-Wire bus.
    /// # Arguments
    ///
    /// * `bit` - The bit to write.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError>;

    /// Reads a single bit from the 1-Wire bus.
    /// # Returns
    /// The bit read from the bus.
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError>;

    /// Writes a byte to the 1-Wire bus, least significant bit first.
    /// # Arguments
    /// * `byte` - The byte to write to the bus.
    ///
    /// # Errors
    /// This method returns an error if the write operation fails.
    fn write_byte(&mut self, byte: u8) -> OneWireResult<(), Self::BusError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 0x1 == 0x1)?;
        }
        Ok(())
    }

    /// Reads a byte from the 1-Wire bus, least significant bit first.
    /// # Returns
    /// Byte read from the bus.
    ///
    /// # Errors
    /// This method returns an error if the read operation fails.
    fn read_byte(&mut self) -> OneWireResult<u8, Self::BusError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Writes every byte of `bytes` in order.
    fn write_bytes(&mut self, bytes: &[u8]) -> OneWireResult<(), Self::BusError> {
        for &b in bytes.iter() {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Fills `buf` with bytes read from the bus.
    fn read_bytes(&mut self, buf: &mut [u8]) -> OneWireResult<(), Self::BusError> {
        for b in buf.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(())
    }

    /// Sends the Match ROM command followed by the 8 ROM bytes.
    /// Must follow a [reset](OneWire::reset).
    fn select(&mut self, rom: &Rom) -> OneWireResult<(), Self::BusError> {
        self.write_byte(ONEWIRE_MATCH_ROM_CMD)?;
        self.write_bytes(rom.as_bytes())
    }

    /// Sends the Skip ROM command, addressing every device on the bus.
    /// Must follow a [reset](OneWire::reset).
    fn skip_rom(&mut self) -> OneWireResult<(), Self::BusError> {
        self.write_byte(ONEWIRE_SKIP_ROM_CMD)
    }

    /// Addresses devices on the 1-Wire bus.
    ///
    /// Resets the bus, then selects the device with the given ROM, or all devices
    /// when `rom` is [`None`].
    ///
    /// # Errors
    /// [`OneWireError::NoDevicePresent`] if nothing answers the reset pulse.
    fn address(&mut self, rom: Option<&Rom>) -> OneWireResult<(), Self::BusError> {
        if !self.reset()? {
            return Err(OneWireError::NoDevicePresent);
        }
        match rom {
            Some(rom) => self.select(rom),
            None => self.skip_rom(),
        }
    }
}
