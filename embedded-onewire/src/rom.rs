use core::fmt;

use crate::OneWireCrc;

/// 64-bit ROM code of a 1-Wire device.
///
/// | Byte | Description |
/// |-----|-------------|
/// | 0 | Family code (e.g., 0x28 for DS18B20) |
/// | 1-6 | Serial number, least significant byte first |
/// | 7 | CRC-8 of bytes 0-6 |
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rom([u8; 8]);

impl Rom {
    /// Wrap raw ROM bytes as read from the bus (byte 0 first).
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Family code of the device.
    pub const fn family(&self) -> u8 {
        self.0[0]
    }

    /// Raw bytes in bus order.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Whether the trailing byte is the CRC of the first seven.
    pub fn is_valid(&self) -> bool {
        OneWireCrc::validate(&self.0)
    }
}

impl From<u64> for Rom {
    fn from(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
}

impl From<Rom> for u64 {
    fn from(rom: Rom) -> Self {
        u64::from_le_bytes(rom.0)
    }
}

impl fmt::Debug for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rom({:016x})", u64::from(*self))
    }
}

impl fmt::LowerHex for Rom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&u64::from(*self), f)
    }
}
