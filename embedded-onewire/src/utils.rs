#[derive(Debug, Default)]
/// Calculate CRC-8 used in 1-Wire communications.
///
/// Dallas/Maxim polynomial `x^8 + x^5 + x^4 + 1`, processed LSB first
/// (reflected form `0x8c`), initial value 0 and no final XOR.
pub struct OneWireCrc(u8);

#[cfg(feature = "crc-table")]
const CRC_TABLE: [u8; 256] = build_table();

#[cfg(feature = "crc-table")]
const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x1 == 0x1 {
                (crc >> 1) ^ 0x8c
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

impl OneWireCrc {
    /// Get the current CRC value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Update the CRC with the incoming byte.
    #[cfg(feature = "crc-table")]
    pub fn update(&mut self, byte: u8) {
        self.0 = CRC_TABLE[(self.0 ^ byte) as usize];
    }

    /// Update the CRC with the incoming byte.
    #[cfg(not(feature = "crc-table"))]
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0 ^ byte; // XOR the byte with the current CRC value
        for _ in 0..8 {
            if crc & 0x1 == 0x1 {
                crc = (crc >> 1) ^ 0x8c; // Polynomial for CRC-8
            } else {
                crc >>= 1;
            }
        }
        self.0 = crc;
    }

    /// Compute the CRC of a sequence of bytes.
    pub fn checksum(sequence: &[u8]) -> u8 {
        let mut crc = OneWireCrc(0);
        for &byte in sequence.iter() {
            crc.update(byte);
        }
        crc.0
    }

    /// Validate a sequence of bytes where the last byte is the 1-Wire CRC of
    /// the previous bytes.
    pub fn validate(sequence: &[u8]) -> bool {
        match sequence.split_last() {
            Some((&crc, data)) => Self::checksum(data) == crc,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    const SEED: u64 = 0x0123_4567;

    #[test]
    fn known_rom_validates() {
        // DS18B20 ROM from the Maxim application note 27 example.
        let rom = [0x02, 0x1c, 0xb8, 0x01, 0x00, 0x00, 0x00, 0xa2];
        assert!(OneWireCrc::validate(&rom));
        assert_eq!(OneWireCrc::checksum(&rom[..7]), 0xa2);
    }

    #[test]
    fn appended_checksum_always_validates() {
        let mut rng = StdRng::seed_from_u64(SEED);
        for _ in 0..256 {
            let mut buf = [0u8; 8];
            rng.fill(&mut buf[..7]);
            buf[7] = OneWireCrc::checksum(&buf[..7]);
            assert!(OneWireCrc::validate(&buf));
        }
    }

    #[test]
    fn any_single_bit_flip_is_detected() {
        let mut rng = StdRng::seed_from_u64(SEED + 1);
        for _ in 0..32 {
            let mut buf = [0u8; 8];
            rng.fill(&mut buf[..7]);
            buf[7] = OneWireCrc::checksum(&buf[..7]);
            for bit in 0..64 {
                let mut corrupted = buf;
                corrupted[bit / 8] ^= 1 << (bit % 8);
                assert!(!OneWireCrc::validate(&corrupted), "flip of bit {bit} went unnoticed");
            }
        }
    }

    #[test]
    fn empty_sequence_is_invalid() {
        assert!(!OneWireCrc::validate(&[]));
    }
}
