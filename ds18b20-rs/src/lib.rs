#![no_std]
//! # ds18b20
//! Driver for one or more DS18B20 temperature probes sharing a 1-Wire bus.
//!
//! The group is discovered with a family-filtered ROM search, converts all probes at once
//! with Skip ROM and reads each scratchpad back by address. Conversion timing is tracked
//! against a caller-supplied millisecond clock, so a conversion can be requested in one
//! control tick and collected in a later one without blocking in between.
use core::iter::zip;
use embedded_hal::delay::DelayNs;
use embedded_onewire::{
    OneWire, OneWireCrc, OneWireError, OneWireResult, OneWireSearch, OneWireSearchKind, Rom,
};
use fixed::types::I12F4;

/// Value reported by [`Ds18b20Group::temperature_celsius`] when no valid reading exists.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// Raw scratchpad value the probe holds after power-on, before its first conversion.
const POWER_ON_RAW: i16 = 0x0550;

const POLL_SLICE_MS: u32 = 10;
const EEPROM_WRITE_MS: u32 = 10;

/// DS18B20 error type.
#[derive(Debug, PartialEq, Eq)]
pub enum Ds18b20Error<E> {
    /// 1-Wire bus error.
    Bus(OneWireError<E>),
    /// The search found no DS18B20 on the bus, or [`Ds18b20Group::begin`] was never called.
    NoDevices,
    /// The scratchpad still holds the 85 °C power-on value.
    PowerOnReading,
}

impl<E> From<OneWireError<E>> for Ds18b20Error<E> {
    fn from(e: OneWireError<E>) -> Self {
        Self::Bus(e)
    }
}

/// Result alias for DS18B20 operations.
pub type Ds18b20Result<T, E> = Result<T, Ds18b20Error<E>>;

/// Up to `N` DS18B20 probes on one bus.
#[derive(Debug)]
pub struct Ds18b20Group<const N: usize> {
    devices: usize,
    roms: [Rom; N],
    temps: [Temperature; N],
    resolution: ReadoutResolution,
    requested_at: u32,
    pending: bool,
}

impl<const N: usize> Default for Ds18b20Group<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Ds18b20Group<N> {
    /// Family code of the DS18B20.
    #[inline]
    pub const fn family() -> u8 {
        0x28
    }

    /// Creates an empty group at 12-bit resolution.
    pub fn new() -> Self {
        Self {
            devices: 0,
            roms: [Rom::default(); N],
            temps: [Temperature::ZERO; N],
            resolution: ReadoutResolution::default(),
            requested_at: 0,
            pending: false,
        }
    }

    /// Resolution applied to every probe by [`begin`](Ds18b20Group::begin).
    pub fn with_resolution(mut self, resolution: ReadoutResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Addresses of the discovered probes.
    pub fn roms(&self) -> &[Rom] {
        &self.roms[..self.devices]
    }

    /// Number of discovered probes.
    pub fn device_count(&self) -> usize {
        self.devices
    }

    /// Current resolution setting.
    pub fn resolution(&self) -> ReadoutResolution {
        self.resolution
    }

    /// Whether a conversion has been requested and not yet collected.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Discovers the probes on the bus and applies the configured resolution to them.
    ///
    /// The search restarts from scratch and stops once it is exhausted or `N` probes
    /// have been found.
    ///
    /// # Returns
    /// The number of probes found.
    ///
    /// # Errors
    /// [`Ds18b20Error::NoDevices`] if no DS18B20 answered, or a bus error during the search.
    pub fn begin<O: OneWire, D: DelayNs>(
        &mut self,
        bus: &mut O,
        delay: &mut D,
    ) -> Ds18b20Result<usize, O::BusError> {
        self.devices = 0;
        self.pending = false;
        let mut search = OneWireSearch::with_family(OneWireSearchKind::Normal, Self::family());
        while self.devices < N {
            match search.next(bus)? {
                Some(rom) => {
                    log::debug!("DS18B20 {:x}", rom);
                    self.roms[self.devices] = rom;
                    self.devices += 1;
                }
                None => break,
            }
        }
        if self.devices == 0 {
            log::warn!("No DS18B20 found");
            return Err(Ds18b20Error::NoDevices);
        }
        log::info!("Found {} DS18B20 device(s)", self.devices);
        self.set_resolution(bus, delay, self.resolution)?;
        Ok(self.devices)
    }

    /// Starts a temperature conversion on every probe at once.
    ///
    /// # Arguments
    /// * `now_ms` - Current time on a monotonic millisecond clock.
    ///
    /// # Errors
    /// [`Ds18b20Error::NoDevices`] before a successful [`begin`](Ds18b20Group::begin),
    /// [`OneWireError::NoDevicePresent`] if the reset goes unanswered.
    pub fn request_conversion<O: OneWire>(
        &mut self,
        bus: &mut O,
        now_ms: u32,
    ) -> Ds18b20Result<(), O::BusError> {
        if self.devices == 0 {
            return Err(Ds18b20Error::NoDevices);
        }
        bus.address(None)?;
        bus.write_byte(DS18B20_START_CONV)?;
        self.requested_at = now_ms;
        self.pending = true;
        Ok(())
    }

    /// Whether the outstanding conversion has had time to finish.
    ///
    /// The conversion time follows the current resolution, so changing the resolution
    /// while a conversion is pending re-times it. Returns `true` when nothing is pending.
    pub fn is_conversion_complete(&mut self, now_ms: u32) -> bool {
        if !self.pending {
            return true;
        }
        if now_ms.wrapping_sub(self.requested_at) >= self.resolution.conversion_ms() {
            self.pending = false;
        }
        !self.pending
    }

    /// Sleeps in 10 ms slices until the outstanding conversion is complete.
    ///
    /// # Returns
    /// `now_ms` advanced by the time spent waiting.
    pub fn block_until_complete<D: DelayNs>(&mut self, delay: &mut D, now_ms: u32) -> u32 {
        let mut now = now_ms;
        while !self.is_conversion_complete(now) {
            delay.delay_ms(POLL_SLICE_MS);
            now = now.wrapping_add(POLL_SLICE_MS);
        }
        now
    }

    /// Temperature of the first probe in degrees Celsius.
    ///
    /// Waits for a pending conversion first. Any failure, including the power-on value,
    /// is reported as [`DEVICE_DISCONNECTED_C`].
    pub fn temperature_celsius<O: OneWire, D: DelayNs>(
        &mut self,
        bus: &mut O,
        delay: &mut D,
        now_ms: u32,
    ) -> f32 {
        if self.devices == 0 {
            return DEVICE_DISCONNECTED_C;
        }
        self.block_until_complete(delay, now_ms);
        let rom = self.roms[0];
        match self.read_temperature(bus, Some(&rom)) {
            Ok(t) => t.to_num(),
            Err(_) => {
                log::debug!("DS18B20 {:x} read failed", rom);
                DEVICE_DISCONNECTED_C
            }
        }
    }

    /// Temperature of the first probe in degrees Fahrenheit, see
    /// [`temperature_celsius`](Ds18b20Group::temperature_celsius).
    pub fn temperature_fahrenheit<O: OneWire, D: DelayNs>(
        &mut self,
        bus: &mut O,
        delay: &mut D,
        now_ms: u32,
    ) -> f32 {
        celsius_to_fahrenheit(self.temperature_celsius(bus, delay, now_ms))
    }

    /// Reads the last converted temperature of one probe.
    ///
    /// # Arguments
    /// * `rom` - Probe to read, or [`None`] to use Skip ROM on a single-drop bus.
    ///
    /// # Errors
    /// Bus errors, [`OneWireError::InvalidCrc`] for a corrupted scratchpad and
    /// [`Ds18b20Error::PowerOnReading`] if the probe has not converted since power-on.
    pub fn read_temperature<O: OneWire>(
        &self,
        bus: &mut O,
        rom: Option<&Rom>,
    ) -> Ds18b20Result<Temperature, O::BusError> {
        let scratchpad = read_scratchpad(bus, rom)?;
        decode_temperature(&scratchpad).ok_or(Ds18b20Error::PowerOnReading)
    }

    /// Reads the last converted temperature of every discovered probe, in discovery order.
    pub fn read_temperatures<O: OneWire>(
        &mut self,
        bus: &mut O,
    ) -> Ds18b20Result<&[Temperature], O::BusError> {
        for (rom, temp) in zip(
            self.roms[..self.devices].iter(),
            self.temps[..self.devices].iter_mut(),
        ) {
            let scratchpad = read_scratchpad(bus, Some(rom))?;
            *temp = decode_temperature(&scratchpad).ok_or(Ds18b20Error::PowerOnReading)?;
        }
        Ok(&self.temps[..self.devices])
    }

    /// Sets the resolution of every probe and stores it in their EEPROM.
    ///
    /// Each probe's scratchpad is read so the alarm registers are written back unchanged.
    /// A probe whose scratchpad cannot be read is skipped.
    pub fn set_resolution<O: OneWire, D: DelayNs>(
        &mut self,
        bus: &mut O,
        delay: &mut D,
        resolution: ReadoutResolution,
    ) -> Ds18b20Result<(), O::BusError> {
        self.resolution = resolution;
        for rom in self.roms[..self.devices].iter() {
            let mut scratchpad = match read_scratchpad(bus, Some(rom)) {
                Ok(sp) => sp,
                Err(e) => {
                    log::warn!("DS18B20 {:x}: skipping resolution update: {:?}", rom, e);
                    continue;
                }
            };
            scratchpad[4] = resolution as u8;
            bus.address(Some(rom))?;
            bus.write_byte(DS18B20_WRITE_SCRATCH)?;
            bus.write_bytes(&scratchpad[2..5])?;
            bus.address(Some(rom))?;
            bus.write_byte(DS18B20_COPY_SCRATCH)?;
            delay.delay_ms(EEPROM_WRITE_MS);
        }
        Ok(())
    }

    /// Whether the probe is externally powered (`false` means parasite power).
    pub fn read_power_supply<O: OneWire>(
        &self,
        bus: &mut O,
        rom: Option<&Rom>,
    ) -> OneWireResult<bool, O::BusError> {
        bus.address(rom)?;
        bus.write_byte(DS18B20_READ_POWERMODE)?;
        bus.read_bit()
    }

    /// Reloads alarm and configuration registers from EEPROM into the scratchpad.
    pub fn recall_eeprom<O: OneWire, D: DelayNs>(
        &self,
        bus: &mut O,
        delay: &mut D,
        rom: Option<&Rom>,
    ) -> OneWireResult<(), O::BusError> {
        bus.address(rom)?;
        bus.write_byte(DS18B20_RECALL_EEPROM)?;
        delay.delay_ms(EEPROM_WRITE_MS);
        Ok(())
    }
}

/// Reads and validates the 9-byte scratchpad of a probe.
///
/// # Errors
/// [`OneWireError::InvalidCrc`] if byte 8 is not the CRC of bytes 0-7.
pub fn read_scratchpad<O: OneWire>(
    bus: &mut O,
    rom: Option<&Rom>,
) -> OneWireResult<[u8; 9], O::BusError> {
    bus.address(rom)?;
    bus.write_byte(DS18B20_READ_SCRATCH)?;
    let mut buf = [0; 9];
    bus.read_bytes(&mut buf)?;
    if OneWireCrc::validate(&buf) {
        Ok(buf)
    } else {
        Err(OneWireError::InvalidCrc)
    }
}

/// Converts a scratchpad to a temperature.
///
/// Bits below the resolution stored in byte 4 are undefined and masked off.
/// Returns [`None`] for the power-on value.
pub fn decode_temperature(scratchpad: &[u8; 9]) -> Option<Temperature> {
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    if raw == POWER_ON_RAW {
        return None;
    }
    let raw = match (scratchpad[4] >> 5) & 0x3 {
        0 => raw & !0x7,
        1 => raw & !0x3,
        2 => raw & !0x1,
        _ => raw,
    };
    Some(Temperature::from_bits(raw))
}

/// Converts degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

const DS18B20_READ_SCRATCH: u8 = 0xbe;
const DS18B20_WRITE_SCRATCH: u8 = 0x4e;
const DS18B20_COPY_SCRATCH: u8 = 0x48;
const DS18B20_START_CONV: u8 = 0x44;
const DS18B20_READ_POWERMODE: u8 = 0xb4;
const DS18B20_RECALL_EEPROM: u8 = 0xb8;

/// Temperature in 1/16 °C steps.
pub type Temperature = I12F4;

/// Conversion resolution, encoded as the configuration register value.
#[repr(u8)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ReadoutResolution {
    /// 0.5 °C, 93.75 ms.
    Resolution9bit = 0x1f,
    /// 0.25 °C, 187.5 ms.
    Resolution10bit = 0x3f,
    /// 0.125 °C, 375 ms.
    Resolution11bit = 0x5f,
    /// 0.0625 °C, 750 ms.
    #[default]
    Resolution12bit = 0x7f,
}

impl ReadoutResolution {
    /// Time a conversion takes at this resolution, in milliseconds.
    pub fn conversion_ms(&self) -> u32 {
        use ReadoutResolution::*;
        match self {
            Resolution9bit => 94,
            Resolution10bit => 188,
            Resolution11bit => 375,
            Resolution12bit => 750,
        }
    }

    /// Resolution in bits.
    pub fn bits(&self) -> u8 {
        9 + ((*self as u8 >> 5) & 0x3)
    }
}

impl TryFrom<u8> for ReadoutResolution {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ReadoutResolution::*;
        match value {
            0x1f | 9 => Ok(Resolution9bit),
            0x3f | 10 => Ok(Resolution10bit),
            0x5f | 11 => Ok(Resolution11bit),
            0x7f | 12 => Ok(Resolution12bit),
            _ => Err("Invalid readout resolution"),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_onewire::{ONEWIRE_MATCH_ROM_CMD, ONEWIRE_SEARCH_CMD, ONEWIRE_SKIP_ROM_CMD};
    use std::{vec, vec::Vec};

    struct SimProbe {
        rom: [u8; 8],
        scratchpad: [u8; 9],
        eeprom: [u8; 3],
        reading: i16,
        copies: usize,
        external_power: bool,
    }

    impl SimProbe {
        fn new(serial: u8, reading: i16) -> Self {
            let mut rom = [Ds18b20Group::<1>::family(), serial, 0x11, 0x22, 0x33, 0x44, 0x55, 0];
            rom[7] = OneWireCrc::checksum(&rom[..7]);
            let mut probe = Self {
                rom,
                scratchpad: [0x50, 0x05, 0x4b, 0x46, 0x7f, 0xff, 0x0c, 0x10, 0],
                eeprom: [0x4b, 0x46, 0x7f],
                reading,
                copies: 0,
                external_power: true,
            };
            probe.seal();
            probe
        }

        fn seal(&mut self) {
            self.scratchpad[8] = OneWireCrc::checksum(&self.scratchpad[..8]);
        }

        fn convert(&mut self) {
            self.scratchpad[..2].copy_from_slice(&self.reading.to_le_bytes());
            self.seal();
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        RomCommand,
        MatchRom(usize),
        Search { pos: usize, step: u8 },
        Function,
        ReadScratchpad(usize),
        WriteScratchpad(usize),
        PowerSupply,
        Idle,
    }

    /// Byte-level model of DS18B20 probes on a wired-AND bus.
    struct SimBus {
        probes: Vec<SimProbe>,
        selected: Vec<bool>,
        phase: Phase,
        shift: u8,
        nbits: u8,
        rom_buf: [u8; 8],
        conversions: usize,
    }

    impl SimBus {
        fn new(probes: Vec<SimProbe>) -> Self {
            let selected = vec![false; probes.len()];
            Self {
                probes,
                selected,
                phase: Phase::Idle,
                shift: 0,
                nbits: 0,
                rom_buf: [0; 8],
                conversions: 0,
            }
        }

        fn rom_bit(rom: &[u8], pos: usize) -> bool {
            rom[pos / 8] >> (pos % 8) & 1 == 1
        }

        fn selected_probes(&mut self) -> impl Iterator<Item = &mut SimProbe> {
            self.probes
                .iter_mut()
                .zip(self.selected.iter())
                .filter(|(_, s)| **s)
                .map(|(p, _)| p)
        }

        fn on_byte(&mut self, byte: u8) {
            self.phase = match self.phase {
                Phase::RomCommand => match byte {
                    ONEWIRE_SKIP_ROM_CMD => {
                        self.selected.iter_mut().for_each(|s| *s = true);
                        Phase::Function
                    }
                    ONEWIRE_MATCH_ROM_CMD => Phase::MatchRom(0),
                    ONEWIRE_SEARCH_CMD => {
                        self.selected.iter_mut().for_each(|s| *s = true);
                        Phase::Search { pos: 0, step: 0 }
                    }
                    _ => Phase::Idle,
                },
                Phase::MatchRom(i) => {
                    self.rom_buf[i] = byte;
                    if i < 7 {
                        Phase::MatchRom(i + 1)
                    } else {
                        for (p, s) in self.probes.iter().zip(self.selected.iter_mut()) {
                            *s = p.rom == self.rom_buf;
                        }
                        Phase::Function
                    }
                }
                Phase::Function => match byte {
                    DS18B20_START_CONV => {
                        self.conversions += 1;
                        self.selected_probes().for_each(SimProbe::convert);
                        Phase::Idle
                    }
                    DS18B20_READ_SCRATCH => Phase::ReadScratchpad(0),
                    DS18B20_WRITE_SCRATCH => Phase::WriteScratchpad(0),
                    DS18B20_COPY_SCRATCH => {
                        self.selected_probes().for_each(|p| {
                            p.eeprom.copy_from_slice(&p.scratchpad[2..5]);
                            p.copies += 1;
                        });
                        Phase::Idle
                    }
                    DS18B20_RECALL_EEPROM => {
                        self.selected_probes().for_each(|p| {
                            p.scratchpad[2..5].copy_from_slice(&p.eeprom);
                            p.seal();
                        });
                        Phase::Idle
                    }
                    DS18B20_READ_POWERMODE => Phase::PowerSupply,
                    _ => Phase::Idle,
                },
                Phase::WriteScratchpad(i) => {
                    self.selected_probes().for_each(|p| {
                        p.scratchpad[2 + i] = byte;
                        p.seal();
                    });
                    if i < 2 {
                        Phase::WriteScratchpad(i + 1)
                    } else {
                        Phase::Idle
                    }
                }
                other => other,
            };
        }

        fn wired_and(&self, f: impl Fn(&SimProbe) -> bool) -> bool {
            self.probes
                .iter()
                .zip(self.selected.iter())
                .filter(|(_, s)| **s)
                .all(|(p, _)| f(p))
        }
    }

    impl OneWire for SimBus {
        type BusError = core::convert::Infallible;

        fn reset(&mut self) -> OneWireResult<bool, Self::BusError> {
            self.phase = Phase::RomCommand;
            self.shift = 0;
            self.nbits = 0;
            Ok(!self.probes.is_empty())
        }

        fn write_bit(&mut self, bit: bool) -> OneWireResult<(), Self::BusError> {
            if let Phase::Search { pos, step } = self.phase {
                if step == 2 {
                    for (p, s) in self.probes.iter().zip(self.selected.iter_mut()) {
                        if Self::rom_bit(&p.rom, pos) != bit {
                            *s = false;
                        }
                    }
                    self.phase = if pos < 63 {
                        Phase::Search { pos: pos + 1, step: 0 }
                    } else {
                        Phase::Idle
                    };
                }
                return Ok(());
            }
            self.shift |= (bit as u8) << self.nbits;
            self.nbits += 1;
            if self.nbits == 8 {
                let byte = self.shift;
                self.shift = 0;
                self.nbits = 0;
                self.on_byte(byte);
            }
            Ok(())
        }

        fn read_bit(&mut self) -> OneWireResult<bool, Self::BusError> {
            Ok(match self.phase {
                Phase::Search { pos, step } if step < 2 => {
                    self.phase = Phase::Search { pos, step: step + 1 };
                    self.wired_and(|p| Self::rom_bit(&p.rom, pos) == (step == 0))
                }
                Phase::ReadScratchpad(bit) => {
                    self.phase = if bit < 71 {
                        Phase::ReadScratchpad(bit + 1)
                    } else {
                        Phase::Idle
                    };
                    self.wired_and(|p| Self::rom_bit(&p.scratchpad, bit))
                }
                Phase::PowerSupply => self.wired_and(|p| p.external_power),
                _ => true,
            })
        }
    }

    fn scratchpad(raw: i16, config: u8) -> [u8; 9] {
        let [lo, hi] = raw.to_le_bytes();
        let mut sp = [lo, hi, 0x4b, 0x46, config, 0xff, 0x0c, 0x10, 0];
        sp[8] = OneWireCrc::checksum(&sp[..8]);
        sp
    }

    #[test]
    fn power_on_value_is_rejected() {
        assert_eq!(decode_temperature(&scratchpad(0x0550, 0x7f)), None);
    }

    #[test]
    fn low_bits_are_masked_by_resolution() {
        let t9 = decode_temperature(&scratchpad(0x0191, 0x1f)).unwrap();
        assert_eq!(t9, Temperature::from_num(25.0));
        let t12 = decode_temperature(&scratchpad(0x0191, 0x7f)).unwrap();
        assert_eq!(t12, Temperature::from_num(25.0625));
        let t10 = decode_temperature(&scratchpad(0x0193, 0x3f)).unwrap();
        assert_eq!(t10, Temperature::from_num(25.0));
    }

    #[test]
    fn negative_temperatures_decode() {
        let t = decode_temperature(&scratchpad(-0x6f, 0x7f)).unwrap();
        assert_eq!(t.to_num::<f32>(), -6.9375);
        let t = decode_temperature(&scratchpad(-0x6f, 0x1f)).unwrap();
        assert_eq!(t.to_num::<f32>(), -7.0);
    }

    #[test]
    fn resolution_table() {
        assert_eq!(ReadoutResolution::Resolution9bit.bits(), 9);
        assert_eq!(ReadoutResolution::Resolution12bit.bits(), 12);
        assert_eq!(ReadoutResolution::try_from(10), Ok(ReadoutResolution::Resolution10bit));
        assert_eq!(ReadoutResolution::try_from(0x5f), Ok(ReadoutResolution::Resolution11bit));
        assert!(ReadoutResolution::try_from(13).is_err());
    }

    #[test]
    fn begin_finds_probes_and_programs_resolution() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191), SimProbe::new(2, 0x0180)]);
        let mut group =
            Ds18b20Group::<8>::new().with_resolution(ReadoutResolution::Resolution9bit);

        assert_eq!(group.begin(&mut bus, &mut NoopDelay::new()), Ok(2));
        assert_eq!(group.device_count(), 2);
        for probe in bus.probes.iter() {
            assert_eq!(probe.scratchpad[4], 0x1f);
            assert_eq!(probe.eeprom, [0x4b, 0x46, 0x1f]);
            assert_eq!(probe.copies, 1);
            assert!(group.roms().contains(&Rom::new(probe.rom)));
        }
    }

    #[test]
    fn begin_without_probes_fails() {
        let mut bus = SimBus::new(Vec::new());
        let mut group = Ds18b20Group::<8>::new();
        assert_eq!(
            group.begin(&mut bus, &mut NoopDelay::new()),
            Err(Ds18b20Error::NoDevices)
        );
        assert_eq!(
            group.request_conversion(&mut bus, 0),
            Err(Ds18b20Error::NoDevices)
        );
        assert_eq!(
            group.temperature_celsius(&mut bus, &mut NoopDelay::new(), 0),
            DEVICE_DISCONNECTED_C
        );
    }

    #[test]
    fn capacity_limits_enumeration() {
        let probes = (1..=4).map(|i| SimProbe::new(i, 0x0191)).collect();
        let mut bus = SimBus::new(probes);
        let mut group = Ds18b20Group::<2>::new();
        assert_eq!(group.begin(&mut bus, &mut NoopDelay::new()), Ok(2));
    }

    #[test]
    fn conversion_completes_after_resolution_time() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191)]);
        let mut group = Ds18b20Group::<8>::new();
        group.begin(&mut bus, &mut NoopDelay::new()).unwrap();

        assert!(group.is_conversion_complete(0));
        group.request_conversion(&mut bus, 1000).unwrap();
        assert_eq!(bus.conversions, 1);
        assert!(!group.is_conversion_complete(1000));
        assert!(!group.is_conversion_complete(1749));
        assert!(group.is_conversion_complete(1750));
        assert!(group.is_conversion_complete(1751));
        assert!(!group.is_pending());
    }

    #[test]
    fn lowering_resolution_retimes_pending_conversion() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191)]);
        let mut group = Ds18b20Group::<8>::new();
        group.begin(&mut bus, &mut NoopDelay::new()).unwrap();

        group.request_conversion(&mut bus, u32::MAX - 50).unwrap();
        assert!(!group.is_conversion_complete(20));
        group
            .set_resolution(&mut bus, &mut NoopDelay::new(), ReadoutResolution::Resolution9bit)
            .unwrap();
        assert!(!group.is_conversion_complete(40));
        assert!(group.is_conversion_complete(43));
    }

    #[test]
    fn resolution_update_skips_unreadable_probe() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191), SimProbe::new(2, 0x0180)]);
        let mut group = Ds18b20Group::<8>::new();
        let mut delay = NoopDelay::new();
        group.begin(&mut bus, &mut delay).unwrap();

        bus.probes[0].scratchpad[0] ^= 0x04;
        assert_eq!(
            group.set_resolution(&mut bus, &mut delay, ReadoutResolution::Resolution10bit),
            Ok(())
        );
        assert_eq!(bus.probes[0].scratchpad[4], 0x7f);
        assert_eq!(bus.probes[0].copies, 1);
        assert_eq!(bus.probes[1].scratchpad[4], 0x3f);
        assert_eq!(bus.probes[1].eeprom, [0x4b, 0x46, 0x3f]);
        assert_eq!(bus.probes[1].copies, 2);
    }

    #[test]
    fn block_until_complete_advances_the_clock() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191)]);
        let mut group =
            Ds18b20Group::<8>::new().with_resolution(ReadoutResolution::Resolution10bit);
        group.begin(&mut bus, &mut NoopDelay::new()).unwrap();

        group.request_conversion(&mut bus, 0).unwrap();
        let now = group.block_until_complete(&mut NoopDelay::new(), 0);
        assert_eq!(now, 190);
        assert!(!group.is_pending());
    }

    #[test]
    fn reads_first_probe_after_conversion() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191)]);
        let mut group = Ds18b20Group::<8>::new();
        let mut delay = NoopDelay::new();
        group.begin(&mut bus, &mut delay).unwrap();

        // Nothing converted yet: the scratchpad still holds 85 °C.
        assert_eq!(group.temperature_celsius(&mut bus, &mut delay, 0), DEVICE_DISCONNECTED_C);

        group.request_conversion(&mut bus, 0).unwrap();
        assert_eq!(group.temperature_celsius(&mut bus, &mut delay, 0), 25.0625);
        let fahrenheit = group.temperature_fahrenheit(&mut bus, &mut delay, 0);
        assert!((fahrenheit - 77.1125).abs() < 1e-4);
    }

    #[test]
    fn corrupted_scratchpad_reads_as_disconnected() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191)]);
        let mut group = Ds18b20Group::<8>::new();
        let mut delay = NoopDelay::new();
        group.begin(&mut bus, &mut delay).unwrap();
        group.request_conversion(&mut bus, 0).unwrap();

        bus.probes[0].scratchpad[0] ^= 0x04;
        let rom = group.roms()[0];
        assert_eq!(
            group.read_temperature(&mut bus, Some(&rom)),
            Err(Ds18b20Error::Bus(OneWireError::InvalidCrc))
        );
        assert_eq!(group.temperature_celsius(&mut bus, &mut delay, 0), DEVICE_DISCONNECTED_C);
    }

    #[test]
    fn reads_every_probe_by_address() {
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0x0191), SimProbe::new(2, -0x6f)]);
        let mut group = Ds18b20Group::<8>::new();
        group.begin(&mut bus, &mut NoopDelay::new()).unwrap();
        group.request_conversion(&mut bus, 0).unwrap();

        let mut temps: Vec<f32> = group
            .read_temperatures(&mut bus)
            .unwrap()
            .iter()
            .map(|t| t.to_num())
            .collect();
        temps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(temps, [-6.9375, 25.0625]);
    }

    #[test]
    fn power_supply_and_eeprom_recall() {
        let mut parasitic = SimProbe::new(2, 0);
        parasitic.external_power = false;
        let mut bus = SimBus::new(vec![SimProbe::new(1, 0), parasitic]);
        let mut group = Ds18b20Group::<8>::new();
        let mut delay = NoopDelay::new();
        group.begin(&mut bus, &mut delay).unwrap();

        let roms: Vec<Rom> = group.roms().to_vec();
        let powered: Vec<bool> = roms
            .iter()
            .map(|rom| group.read_power_supply(&mut bus, Some(rom)).unwrap())
            .collect();
        assert_eq!(powered.iter().filter(|p| !**p).count(), 1);
        assert_eq!(group.read_power_supply(&mut bus, None), Ok(false));

        bus.probes[0].scratchpad[4] = 0x1f;
        group.recall_eeprom(&mut bus, &mut delay, None).unwrap();
        assert_eq!(bus.probes[0].scratchpad[4], 0x7f);
    }
}
