//! Sensor sources consumed by the poller, and their adapters over the drivers.

use crate::sht30::Sht30;
use dht22::Dht22;
use ds18b20::{DEVICE_DISCONNECTED_C, Ds18b20Group, Ds18b20Result, ReadoutResolution};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    i2c::I2c,
    spi::SpiDevice,
};
use embedded_onewire::OneWire;
use nrf24l01::{
    DataRate, Nrf24, Nrf24Result, PowerLevel,
    remote::{PH_NODE_ADDRESS, REMOTE_CHANNEL, RemoteNode, TDS_NODE_ADDRESS},
};

/// A temperature and humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// °C.
    pub temperature: f32,
    /// Relative humidity, %.
    pub humidity: f32,
}

/// Nutrient water temperature.
pub trait WaterTemperatureSensor {
    /// Measure, blocking for the conversion. [`None`] on any failure.
    fn water_temperature(&mut self, now_ms: u32) -> Option<f32>;
}

/// Air temperature and humidity.
pub trait ClimateSensor {
    /// Measure. [`None`] on any failure.
    fn climate(&mut self, now_ms: u32) -> Option<Climate>;
}

/// Values received from the remote nodes since the last call.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RemoteValues {
    /// pH node channel A0.
    pub ph: Option<f32>,
    /// TDS node channel A0, ppm.
    pub tds: Option<f32>,
}

/// The remote sensor nodes.
pub trait RemoteSource {
    /// Drain pending packets.
    fn receive(&mut self) -> RemoteValues;
}

/// DS18B20 probes on their own 1-Wire bus; the first probe is the water probe.
pub struct WaterProbe<B, D, const N: usize> {
    bus: B,
    delay: D,
    group: Ds18b20Group<N>,
}

impl<B: OneWire, D: DelayNs, const N: usize> WaterProbe<B, D, N> {
    /// Probes on `bus`, read at `resolution`.
    pub fn new(bus: B, delay: D, resolution: ReadoutResolution) -> Self {
        Self {
            bus,
            delay,
            group: Ds18b20Group::new().with_resolution(resolution),
        }
    }

    /// Discover the probes and program their resolution.
    pub fn begin(&mut self) -> Ds18b20Result<usize, B::BusError> {
        self.group.begin(&mut self.bus, &mut self.delay)
    }

    /// Discovered probes.
    pub fn group(&self) -> &Ds18b20Group<N> {
        &self.group
    }
}

impl<B: OneWire, D: DelayNs, const N: usize> WaterTemperatureSensor for WaterProbe<B, D, N> {
    fn water_temperature(&mut self, now_ms: u32) -> Option<f32> {
        if self.group.request_conversion(&mut self.bus, now_ms).is_err() {
            log::debug!("DS18B20 conversion request failed");
            return None;
        }
        let t = self
            .group
            .temperature_celsius(&mut self.bus, &mut self.delay, now_ms);
        (t != DEVICE_DISCONNECTED_C).then_some(t)
    }
}

impl<P, D> ClimateSensor for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn climate(&mut self, now_ms: u32) -> Option<Climate> {
        match self.read(now_ms) {
            Ok(m) => Some(Climate {
                temperature: m.temperature,
                humidity: m.humidity,
            }),
            Err(e) => {
                log::debug!("DHT22 read failed: {:?}", e);
                None
            }
        }
    }
}

impl<I: I2c, D: DelayNs> ClimateSensor for Sht30<I, D> {
    fn climate(&mut self, _now_ms: u32) -> Option<Climate> {
        match self.measure() {
            Ok(c) => Some(c),
            Err(e) => {
                log::debug!("SHT30 read failed: {:?}", e);
                None
            }
        }
    }
}

/// Depth of the radio's RX FIFO.
const RX_FIFO_DEPTH: usize = 3;

/// The radio listening for the pH node on pipe 0 and the TDS node on pipe 1.
pub struct RemoteLink<SPI, CE, D> {
    radio: Nrf24<SPI, CE, D>,
    ph: RemoteNode,
    tds: RemoteNode,
}

impl<SPI: SpiDevice, CE: OutputPin, D: DelayNs> RemoteLink<SPI, CE, D> {
    /// Initialise `radio` for the remote nodes and start listening.
    pub fn begin(mut radio: Nrf24<SPI, CE, D>) -> Nrf24Result<Self, SPI::Error, CE::Error> {
        radio.init()?;
        radio.set_channel(REMOTE_CHANNEL)?;
        radio.set_data_rate(DataRate::Mbps1)?;
        radio.set_power_level(PowerLevel::High)?;
        radio.open_reading_pipe(0, &PH_NODE_ADDRESS)?;
        radio.open_reading_pipe(1, &TDS_NODE_ADDRESS)?;
        radio.start_listening()?;
        log::info!(
            "nRF24L01 listening for pH and TDS nodes on channel {}",
            REMOTE_CHANNEL
        );
        Ok(Self {
            radio,
            ph: RemoteNode::new(0),
            tds: RemoteNode::new(1),
        })
    }
}

impl<SPI: SpiDevice, CE: OutputPin, D: DelayNs> RemoteSource for RemoteLink<SPI, CE, D> {
    fn receive(&mut self) -> RemoteValues {
        let mut values = RemoteValues::default();
        for _ in 0..RX_FIFO_DEPTH {
            let ph = self.ph.read(&mut self.radio);
            let tds = self.tds.read(&mut self.radio);
            match (ph, tds) {
                (Ok(false), Ok(false)) => break,
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("nRF24L01 receive failed: {:?}", e);
                    break;
                }
                (Ok(ph), Ok(tds)) => {
                    if ph {
                        values.ph = Some(self.ph.value(0));
                    }
                    if tds {
                        values.tds = Some(self.tds.value(0));
                    }
                }
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::{cell::RefCell, convert::Infallible};
    use embedded_hal::{
        digital::ErrorType as PinErrorType,
        spi::{ErrorKind, ErrorType, Operation},
    };
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction},
    };
    use nrf24l01::{FifoStatus, Status, reg, remote::RemotePacket};
    use std::{collections::VecDeque, rc::Rc};

    /// Receive path of the radio: registers plus an RX FIFO tagged by pipe.
    #[derive(Default)]
    struct Air {
        regs: [u8; 0x20],
        fifo: VecDeque<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl Air {
        fn send(&mut self, pipe: u8, value: f32) {
            let packet = RemotePacket {
                values: [value, 0.0, 0.0, 0.0],
            };
            self.fifo.push_back((pipe, packet.encode().to_vec()));
        }

        fn status(&self) -> u8 {
            let pipe = self.fifo.front().map_or(7, |(p, _)| *p);
            Status::new().with_rx_p_no(pipe).into()
        }

        fn handle(&mut self, frame: &mut [u8]) {
            let status = self.status();
            match frame[0] {
                c if c < 0x20 => {
                    let value = match c & 0x1f {
                        reg::STATUS => status,
                        reg::FIFO_STATUS => FifoStatus::new()
                            .with_rx_empty(self.fifo.is_empty())
                            .into(),
                        a => self.regs[a as usize],
                    };
                    frame[1..].fill(value);
                }
                c if c < 0x40 => self.regs[(c & 0x1f) as usize] = frame[1],
                0x60 => frame[1] = self.fifo.front().map_or(0, |(_, p)| p.len() as u8),
                0x61 => {
                    if let Some((_, payload)) = self.fifo.pop_front() {
                        for (b, v) in frame[1..].iter_mut().zip(payload) {
                            *b = v;
                        }
                    }
                }
                0xe2 => self.fifo.clear(),
                _ => {}
            }
            frame[0] = status;
        }
    }

    #[derive(Clone, Default)]
    struct AirSpi(Rc<RefCell<Air>>);

    impl ErrorType for AirSpi {
        type Error = ErrorKind;
    }

    impl SpiDevice for AirSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            let mut air = self.0.borrow_mut();
            if air.fail {
                return Err(ErrorKind::Other);
            }
            for op in operations.iter_mut() {
                if let Operation::TransferInPlace(frame) = op {
                    air.handle(frame);
                }
            }
            Ok(())
        }
    }

    struct Ce;

    impl PinErrorType for Ce {
        type Error = Infallible;
    }

    impl OutputPin for Ce {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn link() -> (RemoteLink<AirSpi, Ce, NoopDelay>, Rc<RefCell<Air>>) {
        let spi = AirSpi::default();
        let air = spi.0.clone();
        let link = RemoteLink::begin(Nrf24::new(spi, Ce, NoopDelay::new())).unwrap();
        (link, air)
    }

    #[test]
    fn interleaved_fifo_is_split_by_pipe() {
        let (mut link, air) = link();
        assert_eq!(link.receive(), RemoteValues::default());

        air.borrow_mut().send(1, 420.0);
        air.borrow_mut().send(0, 6.8);
        air.borrow_mut().send(0, 6.9);
        assert_eq!(
            link.receive(),
            RemoteValues {
                ph: Some(6.9),
                tds: Some(420.0),
            }
        );
        assert!(air.borrow().fifo.is_empty());
    }

    #[test]
    fn drain_stops_at_fifo_depth() {
        let (mut link, air) = link();
        for v in [6.1, 6.2, 6.3, 6.4] {
            air.borrow_mut().send(0, v);
        }
        assert_eq!(link.receive().ph, Some(6.3));
        assert_eq!(air.borrow().fifo.len(), 1);
        assert_eq!(link.receive().ph, Some(6.4));
    }

    #[test]
    fn radio_fault_yields_nothing() {
        let (mut link, air) = link();
        air.borrow_mut().send(1, 420.0);
        air.borrow_mut().fail = true;
        assert_eq!(link.receive(), RemoteValues::default());
        assert_eq!(air.borrow().fifo.len(), 1);
    }

    #[test]
    fn sht30_failure_is_none() {
        let mut data = vec![0x66, 0x66, 0x00, 0x80, 0x00, 0x00];
        data[2] = crate::sht30::crc8(&data[..2]);
        let expectations = [
            Transaction::write(0x44, vec![0x24, 0x00]),
            Transaction::read(0x44, data),
            Transaction::write(0x44, vec![0x24, 0x00]),
            Transaction::read(0x44, vec![0x80, 0x00, 0xa2, 0x80, 0x00, 0xa2]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut sht = Sht30::new(i2c.clone(), NoopDelay::new());
        // Humidity word CRC is wrong in the first frame.
        assert_eq!(sht.climate(0), None);
        let c = sht.climate(0).unwrap();
        assert!((c.humidity - 50.0).abs() < 0.01);
        i2c.done();
    }
}
