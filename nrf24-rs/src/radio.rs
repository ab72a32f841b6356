use crate::{
    Config, DataRate, Feature, FifoStatus, Interact, MAX_CHANNEL, MAX_PAYLOAD, Nrf24, Nrf24Error,
    Nrf24Result, PowerLevel, RfSetup, Status,
    registers::{
        FLUSH_RX, FLUSH_TX, NOP, R_REGISTER, R_RX_PAYLOAD, R_RX_PL_WID, REGISTER_MASK, W_REGISTER,
        reg,
    },
};
use embedded_hal::{
    delay::DelayNs,
    digital::OutputPin,
    spi::{Operation, SpiDevice},
};

const CSN_SETTLE_NS: u32 = 1_000;
const POWER_ON_MS: u32 = 5;
const RX_SETTLE_US: u32 = 130;
const ADDRESS_WIDTH_5: u8 = 0x03;
const DEFAULT_RETRANSMIT: u8 = 0x5f;
const PIPES_0_1: u8 = 0x03;
const DEFAULT_CHANNEL: u8 = 76;

impl<SPI: SpiDevice, CE: OutputPin, D: DelayNs> Nrf24<SPI, CE, D> {
    /// Bring the radio into a known receive configuration.
    ///
    /// Flushes both FIFOs, clears the interrupt flags and programs 5-byte addresses,
    /// auto-acknowledge and dynamic payloads on pipes 0 and 1, channel 76 at 1 Mbps and
    /// high power, then powers up in PRX mode with a 2-byte CRC. CE stays low until
    /// [`start_listening`](Nrf24::start_listening).
    ///
    /// # Errors
    /// [`Nrf24Error::NotDetected`] if the address width does not read back.
    pub fn init(&mut self) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.ce.set_low().map_err(Nrf24Error::Pin)?;
        self.delay.delay_ms(POWER_ON_MS);

        self.flush_rx()?;
        self.flush_tx()?;
        self.write_register(reg::STATUS, Status::CLEAR_FLAGS)?;
        self.write_register(reg::SETUP_AW, ADDRESS_WIDTH_5)?;
        if self.read_register(reg::SETUP_AW)? != ADDRESS_WIDTH_5 {
            log::warn!("nRF24L01 not responding");
            return Err(Nrf24Error::NotDetected);
        }
        self.write_register(reg::SETUP_RETR, DEFAULT_RETRANSMIT)?;
        self.write_register(reg::EN_AA, PIPES_0_1)?;
        self.write_register(reg::EN_RXADDR, PIPES_0_1)?;
        self.set_channel(DEFAULT_CHANNEL)?;
        self.set_data_rate(DataRate::Mbps1)?;
        self.set_power_level(PowerLevel::High)?;

        Feature::new()
            .with_en_dpl(true)
            .with_en_ack_pay(true)
            .with_en_dyn_ack(true)
            .write(self)?;
        self.write_register(reg::DYNPD, PIPES_0_1)?;

        Config::new()
            .with_en_crc(true)
            .with_crco(true)
            .with_pwr_up(true)
            .with_prim_rx(true)
            .write(self)?;
        self.delay.delay_ms(POWER_ON_MS);
        log::info!("nRF24L01 initialized");
        Ok(())
    }

    /// Set the RF channel, clamped to 0-125.
    pub fn set_channel(&mut self, channel: u8) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.write_register(reg::RF_CH, channel.min(MAX_CHANNEL))
    }

    /// Set the air data rate, leaving the power bits unchanged.
    pub fn set_data_rate(&mut self, rate: DataRate) -> Nrf24Result<(), SPI::Error, CE::Error> {
        let mut setup = RfSetup::new();
        setup.read(self)?;
        setup.with_data_rate(rate).write(self)
    }

    /// Set the output power, leaving the data rate bits unchanged.
    pub fn set_power_level(&mut self, level: PowerLevel) -> Nrf24Result<(), SPI::Error, CE::Error> {
        let mut setup = RfSetup::new();
        setup.read(self)?;
        setup.with_rf_pwr(level as u8).write(self)
    }

    /// Set the static payload width of pipes 0 and 1, clamped to 32.
    pub fn set_payload_size(&mut self, size: u8) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.payload_size = size.min(MAX_PAYLOAD as u8);
        self.write_register(reg::RX_PW_P0, self.payload_size)?;
        self.write_register(reg::RX_PW_P0 + 1, self.payload_size)
    }

    /// Program the receive address of a pipe and enable it.
    ///
    /// Pipes 0 and 1 take the full address. Pipes 2-5 share the upper four bytes of
    /// pipe 1 and only take the least significant byte, `address[0]`.
    ///
    /// # Errors
    /// [`Nrf24Error::InvalidPipe`] for pipes above 5.
    pub fn open_reading_pipe(
        &mut self,
        pipe: u8,
        address: &[u8; 5],
    ) -> Nrf24Result<(), SPI::Error, CE::Error> {
        if pipe > 5 {
            return Err(Nrf24Error::InvalidPipe(pipe));
        }
        let addr_reg = reg::RX_ADDR_P0 + pipe;
        if pipe < 2 {
            self.write_registers(addr_reg, address)?;
        } else {
            self.write_register(addr_reg, address[0])?;
        }
        let enabled = self.read_register(reg::EN_RXADDR)?;
        self.write_register(reg::EN_RXADDR, enabled | (1 << pipe))?;
        log::debug!("nRF24L01 pipe {} listening", pipe);
        Ok(())
    }

    /// Power up in PRX mode, clear the interrupt flags and raise CE.
    pub fn start_listening(&mut self) -> Nrf24Result<(), SPI::Error, CE::Error> {
        let mut cfg = Config::new();
        cfg.read(self)?;
        cfg.with_pwr_up(true).with_prim_rx(true).write(self)?;
        self.write_register(reg::STATUS, Status::CLEAR_FLAGS)?;
        self.ce.set_high().map_err(Nrf24Error::Pin)?;
        self.delay.delay_us(RX_SETTLE_US);
        Ok(())
    }

    /// Drop CE and flush both FIFOs.
    pub fn stop_listening(&mut self) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.ce.set_low().map_err(Nrf24Error::Pin)?;
        self.delay.delay_us(RX_SETTLE_US);
        self.flush_tx()?;
        self.flush_rx()
    }

    /// Whether a payload is waiting in the RX FIFO.
    ///
    /// A set data-ready flag is cleared on the way.
    pub fn available(&mut self) -> Nrf24Result<bool, SPI::Error, CE::Error> {
        let status = self.status()?;
        if status.rx_dr() {
            self.write_register(reg::STATUS, Status::new().with_rx_dr(true).into())?;
            return Ok(true);
        }
        let mut fifo = FifoStatus::new();
        fifo.read(self)?;
        Ok(!fifo.rx_empty())
    }

    /// Pipe of the payload at the head of the RX FIFO, if any.
    pub fn rx_pipe(&mut self) -> Nrf24Result<Option<u8>, SPI::Error, CE::Error> {
        Ok(self.status()?.rx_pipe())
    }

    /// Pop the payload at the head of the RX FIFO into `buf`.
    ///
    /// # Returns
    /// The number of bytes copied, the smaller of the payload width and `buf.len()`.
    /// Bytes beyond `buf` are discarded with the payload.
    ///
    /// # Errors
    /// [`Nrf24Error::InvalidPayloadWidth`] if the reported width is 0 or above 32;
    /// the RX FIFO is flushed.
    pub fn read(&mut self, buf: &mut [u8]) -> Nrf24Result<usize, SPI::Error, CE::Error> {
        let mut frame = [R_RX_PL_WID, NOP];
        self.command(&mut frame)?;
        let width = frame[1];
        if width == 0 || width as usize > MAX_PAYLOAD {
            log::warn!("nRF24L01 invalid payload width {}", width);
            self.flush_rx()?;
            return Err(Nrf24Error::InvalidPayloadWidth(width));
        }

        let width = width as usize;
        let mut frame = [NOP; MAX_PAYLOAD + 1];
        frame[0] = R_RX_PAYLOAD;
        self.command(&mut frame[..=width])?;
        let len = width.min(buf.len());
        buf[..len].copy_from_slice(&frame[1..=len]);

        self.write_register(reg::STATUS, Status::new().with_rx_dr(true).into())?;
        Ok(len)
    }

    /// Read the status register with a NOP.
    pub fn status(&mut self) -> Nrf24Result<Status, SPI::Error, CE::Error> {
        self.command(&mut [NOP])
    }

    /// Discard every payload in the RX FIFO.
    pub fn flush_rx(&mut self) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.command(&mut [FLUSH_RX])?;
        Ok(())
    }

    /// Discard every payload in the TX FIFO.
    pub fn flush_tx(&mut self) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.command(&mut [FLUSH_TX])?;
        Ok(())
    }

    /// Read a single-byte register.
    pub fn read_register(&mut self, addr: u8) -> Nrf24Result<u8, SPI::Error, CE::Error> {
        let mut frame = [R_REGISTER | (addr & REGISTER_MASK), NOP];
        self.command(&mut frame)?;
        Ok(frame[1])
    }

    /// Write a single-byte register.
    pub fn write_register(&mut self, addr: u8, value: u8) -> Nrf24Result<(), SPI::Error, CE::Error> {
        self.command(&mut [W_REGISTER | (addr & REGISTER_MASK), value])?;
        Ok(())
    }

    /// Read a multi-byte register (addresses) into `buf`, at most 5 bytes.
    pub fn read_registers(
        &mut self,
        addr: u8,
        buf: &mut [u8],
    ) -> Nrf24Result<(), SPI::Error, CE::Error> {
        let len = buf.len().min(5);
        let mut frame = [NOP; 6];
        frame[0] = R_REGISTER | (addr & REGISTER_MASK);
        self.command(&mut frame[..=len])?;
        buf[..len].copy_from_slice(&frame[1..=len]);
        Ok(())
    }

    /// Write a multi-byte register (addresses), at most 5 bytes.
    pub fn write_registers(
        &mut self,
        addr: u8,
        data: &[u8],
    ) -> Nrf24Result<(), SPI::Error, CE::Error> {
        let len = data.len().min(5);
        let mut frame = [0; 6];
        frame[0] = W_REGISTER | (addr & REGISTER_MASK);
        frame[1..=len].copy_from_slice(&data[..len]);
        self.command(&mut frame[..=len])?;
        Ok(())
    }

    /// Clock one command frame through the radio; the first byte returned is always STATUS.
    fn command(&mut self, frame: &mut [u8]) -> Nrf24Result<Status, SPI::Error, CE::Error> {
        self.spi
            .transaction(&mut [
                Operation::DelayNs(CSN_SETTLE_NS),
                Operation::TransferInPlace(frame),
                Operation::DelayNs(CSN_SETTLE_NS),
            ])
            .map_err(Nrf24Error::Spi)?;
        Ok(Status::from(frame[0]))
    }
}
