use crate::{
    ONEWIRE_CONDITIONAL_SEARCH_CMD, ONEWIRE_SEARCH_CMD, OneWire, OneWireError, OneWireResult, Rom,
};

/// State of the 1-Wire ROM search.
///
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It only keeps the walk state (last discrepancy, last device flag and the working ROM);
/// the bus is lent to it on every call to [`next`](OneWireSearch::next), so the state can
/// live next to the bus in the driver that owns both.
#[derive(Debug, Clone)]
pub struct OneWireSearch {
    cmd: u8,
    family: u8,
    last_device: bool,
    last_discrepancy: u8,
    rom: [u8; 8],
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Type of search performed using [`OneWireSearch`].
pub enum OneWireSearchKind {
    /// Normal search
    Normal = ONEWIRE_SEARCH_CMD,
    /// Search only for devices with alarm
    Alarmed = ONEWIRE_CONDITIONAL_SEARCH_CMD,
}

impl OneWireSearch {
    /// Creates a new [`OneWireSearch`] instance.
    ///
    /// # Arguments
    /// * `cmd` - The kind of search (normal, or devices in alarm state only).
    pub fn new(cmd: OneWireSearchKind) -> Self {
        let mut search = Self {
            cmd: cmd as _,
            family: 0,
            last_device: false,
            last_discrepancy: 0,
            rom: [0; 8],
        };
        search.reset();
        search
    }

    /// Creates a new [`OneWireSearch`] instance that only reports devices of one family.
    ///
    /// The first pass is steered towards `family` so devices of other families that sort
    /// before it are skipped without being enumerated.
    /// # Arguments
    /// * `cmd` - The kind of search (normal, or devices in alarm state only).
    /// * `family` - The family code of the devices to search for.
    pub fn with_family(cmd: OneWireSearchKind, family: u8) -> Self {
        let mut search = Self::new(cmd);
        search.family = family;
        search.reset();
        search
    }

    /// Resets the search state so the next call to [`next`](OneWireSearch::next)
    /// starts a fresh enumeration.
    pub fn reset(&mut self) {
        self.last_device = false;
        self.rom = [self.family, 0, 0, 0, 0, 0, 0, 0];
        // A family-targeted search replays the family bits on the first pass.
        self.last_discrepancy = if self.family != 0 { 64 } else { 0 };
    }

    /// Whether the previous call returned the last device on the bus.
    pub fn is_exhausted(&self) -> bool {
        self.last_device
    }

    /// Searches for the next device on the 1-Wire bus.
    ///
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    /// Call it repeatedly to find all devices on the bus. Once every device has been
    /// reported it returns `Ok(None)` and the state is reset, so the following call
    /// restarts the enumeration.
    ///
    /// Every unsuccessful pass (no presence pulse, no device answering a bit pair,
    /// an all-zero ROM or a family mismatch) resets the search state.
    ///
    /// # Errors
    /// Bus faults and [`OneWireError::InvalidCrc`] when the isolated ROM fails its CRC.
    /// The search state is reset in both cases.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: OneWire>(&mut self, bus: &mut T) -> OneWireResult<Option<Rom>, T::BusError> {
        if self.last_device {
            self.reset();
            return Ok(None);
        }
        match self.walk(bus) {
            Ok(Some(rom)) => Ok(Some(rom)),
            Ok(None) => {
                self.reset();
                Ok(None)
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Verifies if the device with the given ROM code is present on the 1-Wire bus.
    ///
    /// This resets the search state before and after the check.
    pub fn verify<T: OneWire>(
        &mut self,
        bus: &mut T,
        rom: &Rom,
    ) -> OneWireResult<bool, T::BusError> {
        self.reset();
        self.rom = *rom.as_bytes();
        self.last_discrepancy = 64;
        let res = self.walk(bus);
        self.reset();
        Ok(res? == Some(*rom))
    }

    fn walk<T: OneWire>(&mut self, bus: &mut T) -> OneWireResult<Option<Rom>, T::BusError> {
        if !bus.reset()? {
            return Ok(None);
        }
        bus.write_byte(self.cmd)?;

        let mut last_zero: u8 = 0;
        for id_bit_num in 1..=64u8 {
            let idx = ((id_bit_num - 1) / 8) as usize; // Index in the ROM array
            let rom_mask = 1u8 << ((id_bit_num - 1) % 8); // Mask for the current bit in the ROM byte

            let id_bit = bus.read_bit()?;
            let complement_bit = bus.read_bit()?;
            let dir = if id_bit && complement_bit {
                // Nobody drove the line in either slot: no device is participating.
                return Ok(None);
            } else if id_bit != complement_bit {
                // All remaining devices agree on this bit.
                id_bit
            } else {
                // Discrepancy: replay the previous choice below the last discrepancy,
                // take the 1 branch at it and the 0 branch beyond it.
                let dir = if id_bit_num < self.last_discrepancy {
                    self.rom[idx] & rom_mask > 0
                } else {
                    id_bit_num == self.last_discrepancy
                };
                if !dir {
                    last_zero = id_bit_num;
                }
                dir
            };

            if dir {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }
            // Devices whose bit differs from the direction drop out of this pass.
            bus.write_bit(dir)?;
        }

        self.last_discrepancy = last_zero;
        self.last_device = last_zero == 0;

        let rom = Rom::new(self.rom);
        if rom.family() == 0 {
            return Ok(None);
        }
        if !rom.is_valid() {
            return Err(OneWireError::InvalidCrc);
        }
        if self.family != 0 && rom.family() != self.family {
            return Ok(None);
        }
        log::debug!("1-Wire search found {:x}", rom);
        Ok(Some(rom))
    }
}
