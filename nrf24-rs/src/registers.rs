use crate::traits::{Addressing, Interact};
use bitfield_struct::bitfield;

/// Register addresses.
pub mod reg {
    /// Configuration register.
    pub const CONFIG: u8 = 0x00;
    /// Enhanced ShockBurst auto acknowledgment, one bit per pipe.
    pub const EN_AA: u8 = 0x01;
    /// Enabled RX addresses, one bit per pipe.
    pub const EN_RXADDR: u8 = 0x02;
    /// Address width (0b11 = 5 bytes).
    pub const SETUP_AW: u8 = 0x03;
    /// Automatic retransmission delay and count.
    pub const SETUP_RETR: u8 = 0x04;
    /// RF channel.
    pub const RF_CH: u8 = 0x05;
    /// RF setup register.
    pub const RF_SETUP: u8 = 0x06;
    /// Status register.
    pub const STATUS: u8 = 0x07;
    /// Receive address of pipe 0; pipes 1-5 follow at consecutive addresses.
    pub const RX_ADDR_P0: u8 = 0x0a;
    /// Transmit address.
    pub const TX_ADDR: u8 = 0x10;
    /// Static payload width of pipe 0; pipes 1-5 follow at consecutive addresses.
    pub const RX_PW_P0: u8 = 0x11;
    /// FIFO status register.
    pub const FIFO_STATUS: u8 = 0x17;
    /// Dynamic payload length enable, one bit per pipe.
    pub const DYNPD: u8 = 0x1c;
    /// Feature register.
    pub const FEATURE: u8 = 0x1d;
}

pub(crate) const R_REGISTER: u8 = 0x00;
pub(crate) const W_REGISTER: u8 = 0x20;
pub(crate) const REGISTER_MASK: u8 = 0x1f;
pub(crate) const R_RX_PL_WID: u8 = 0x60;
pub(crate) const R_RX_PAYLOAD: u8 = 0x61;
pub(crate) const FLUSH_TX: u8 = 0xe1;
pub(crate) const FLUSH_RX: u8 = 0xe2;
pub(crate) const NOP: u8 = 0xff;

/// # Configuration register
///
/// Selects CRC, power state and the primary role. The three mask bits suppress the
/// corresponding flag on the IRQ pin.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Config {
    /// 1: PRX, 0: PTX.
    pub prim_rx: bool,
    /// 1: power up, 0: power down.
    pub pwr_up: bool,
    /// CRC encoding scheme, 0: 1 byte, 1: 2 bytes.
    pub crco: bool,
    /// Enable CRC. Forced high if any pipe has auto acknowledgment enabled.
    pub en_crc: bool,
    /// Mask the max retransmit interrupt.
    pub mask_max_rt: bool,
    /// Mask the data sent interrupt.
    pub mask_tx_ds: bool,
    /// Mask the data ready interrupt.
    pub mask_rx_dr: bool,
    #[bits(1)]
    __: u8,
}

impl Addressing for Config {
    const ADDR: u8 = reg::CONFIG;
}

impl Interact for Config {}

/// # Status register
///
/// Shifted out on MOSI's first byte of every SPI command. The three flags are cleared by
/// writing 1 to them.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Status {
    /// TX FIFO full.
    pub tx_full: bool,
    /// Pipe number of the payload at the head of the RX FIFO. 0b110 unused,
    /// 0b111 RX FIFO empty.
    #[bits(3)]
    pub rx_p_no: u8,
    /// Maximum number of retransmits reached.
    pub max_rt: bool,
    /// Data sent.
    pub tx_ds: bool,
    /// Data ready in the RX FIFO.
    pub rx_dr: bool,
    #[bits(1)]
    __: u8,
}

impl Status {
    /// Mask with all three interrupt flags set, for clearing them in one write.
    pub const CLEAR_FLAGS: u8 = 0x70;

    /// Pipe of the payload at the head of the RX FIFO, if any.
    pub fn rx_pipe(&self) -> Option<u8> {
        match self.rx_p_no() {
            p @ 0..=5 => Some(p),
            _ => None,
        }
    }
}

impl Addressing for Status {
    const ADDR: u8 = reg::STATUS;
}

impl Interact for Status {}

/// # RF setup register
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct RfSetup {
    /// Obsolete LNA gain bit on the nRF24L01+, don't care.
    pub lna_hcurr: bool,
    /// Output power, see [`PowerLevel`].
    #[bits(2)]
    pub rf_pwr: u8,
    /// High bit of the data rate selection (2 Mbps).
    pub rf_dr_high: bool,
    /// Force PLL lock signal, test only.
    pub pll_lock: bool,
    /// Low bit of the data rate selection (250 kbps).
    pub rf_dr_low: bool,
    #[bits(1)]
    __: u8,
    /// Continuous carrier transmit, test only.
    pub cont_wave: bool,
}

impl RfSetup {
    /// Data rate encoded in the two rate bits.
    pub fn data_rate(&self) -> DataRate {
        match (self.rf_dr_low(), self.rf_dr_high()) {
            (true, _) => DataRate::Kbps250,
            (false, true) => DataRate::Mbps2,
            (false, false) => DataRate::Mbps1,
        }
    }

    /// Encode a data rate into the two rate bits.
    pub fn with_data_rate(self, rate: DataRate) -> Self {
        self.with_rf_dr_low(rate == DataRate::Kbps250)
            .with_rf_dr_high(rate == DataRate::Mbps2)
    }
}

impl Addressing for RfSetup {
    const ADDR: u8 = reg::RF_SETUP;
}

impl Interact for RfSetup {}

/// # FIFO status register
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FifoStatus {
    /// RX FIFO empty.
    pub rx_empty: bool,
    /// RX FIFO full.
    pub rx_full: bool,
    #[bits(2)]
    __reserved_lo: u8,
    /// TX FIFO empty.
    pub tx_empty: bool,
    /// TX FIFO full.
    pub tx_full: bool,
    /// Reuse last transmitted payload.
    pub tx_reuse: bool,
    #[bits(1)]
    __reserved_hi: u8,
}

impl Addressing for FifoStatus {
    const ADDR: u8 = reg::FIFO_STATUS;
}

impl Interact for FifoStatus {}

/// # Feature register
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Feature {
    /// Enables the W_TX_PAYLOAD_NOACK command.
    pub en_dyn_ack: bool,
    /// Enables payload with ACK.
    pub en_ack_pay: bool,
    /// Enables dynamic payload length.
    pub en_dpl: bool,
    #[bits(5)]
    __: u8,
}

impl Addressing for Feature {
    const ADDR: u8 = reg::FEATURE;
}

impl Interact for Feature {}

/// Air data rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    /// 250 kbps, nRF24L01+ only.
    Kbps250,
    /// 1 Mbps.
    #[default]
    Mbps1,
    /// 2 Mbps.
    Mbps2,
}

/// Output power in TX mode.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    /// -18 dBm.
    Min = 0,
    /// -12 dBm.
    Low = 1,
    /// -6 dBm.
    #[default]
    High = 2,
    /// 0 dBm.
    Max = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_fields() {
        let status = Status::from(0x4e);
        assert!(status.rx_dr());
        assert_eq!(status.rx_p_no(), 7);
        assert_eq!(status.rx_pipe(), None);

        let status = Status::from(0x42);
        assert_eq!(status.rx_pipe(), Some(1));
    }

    #[test]
    fn config_bits() {
        let cfg = Config::new()
            .with_en_crc(true)
            .with_crco(true)
            .with_pwr_up(true)
            .with_prim_rx(true);
        assert_eq!(u8::from(cfg), 0x0f);
    }

    #[test]
    fn rf_setup_rate_and_power() {
        let setup = RfSetup::from(0x0e);
        assert_eq!(setup.data_rate(), DataRate::Mbps2);
        assert_eq!(setup.rf_pwr(), PowerLevel::Max as u8);

        let setup = setup.with_data_rate(DataRate::Kbps250);
        assert_eq!(u8::from(setup), 0x26);
        assert_eq!(setup.data_rate(), DataRate::Kbps250);

        let setup = setup.with_data_rate(DataRate::Mbps1);
        assert_eq!(u8::from(setup), 0x06);
    }

    #[test]
    fn feature_bits() {
        let feature = Feature::new()
            .with_en_dpl(true)
            .with_en_ack_pay(true)
            .with_en_dyn_ack(true);
        assert_eq!(u8::from(feature), 0x07);
    }
}
