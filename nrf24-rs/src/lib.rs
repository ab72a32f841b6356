#![no_std]
#![deny(missing_docs)]

/*! # nRF24L01
 *
 * Receive-side driver for the Nordic nRF24L01(+) 2.4 GHz transceiver.
 *
 * The radio is reached over an [`SpiDevice`](embedded_hal::spi::SpiDevice) (chip select is
 * owned by the device) plus a CE line. Registers are modelled as bitfields implementing
 * [`Interact`], so a read-modify-write reads like `cfg.read(dev)?; cfg.set_x(..); cfg.write(dev)?`.
 *
 * The [`remote`] module decodes the fixed 16-byte packets broadcast by the remote
 * sensor nodes.
 */

mod error;
mod radio;
mod registers;
pub mod remote;
mod traits;

pub use error::Nrf24Error;
pub use registers::{
    Config, DataRate, Feature, FifoStatus, PowerLevel, RfSetup, Status, reg,
};
pub use traits::{Addressing, Interact};

/// Results of nRF24-specific function calls.
pub type Nrf24Result<T, SpiE, PinE> = Result<T, Nrf24Error<SpiE, PinE>>;

/// Largest payload the radio can hold.
pub const MAX_PAYLOAD: usize = 32;

/// Highest valid RF channel.
pub const MAX_CHANNEL: u8 = 125;

/// An nRF24L01 transceiver.
///
/// Takes ownership of an SPI device (implementing [`SpiDevice`](embedded_hal::spi::SpiDevice)),
/// the CE output pin and a timer implementing [`DelayNs`](embedded_hal::delay::DelayNs).
pub struct Nrf24<SPI, CE, D> {
    pub(crate) spi: SPI,
    pub(crate) ce: CE,
    pub(crate) delay: D,
    pub(crate) payload_size: u8,
}

impl<SPI, CE, D> Nrf24<SPI, CE, D> {
    /// Creates a new instance of `Nrf24`. Call [`init`](Nrf24::init) before use.
    pub fn new(spi: SPI, ce: CE, delay: D) -> Self {
        Nrf24 {
            spi,
            ce,
            delay,
            payload_size: MAX_PAYLOAD as u8,
        }
    }

    /// Release the SPI device, CE pin and delay provider.
    pub fn release(self) -> (SPI, CE, D) {
        (self.spi, self.ce, self.delay)
    }

    /// Static payload width programmed by [`set_payload_size`](Nrf24::set_payload_size).
    pub fn payload_size(&self) -> u8 {
        self.payload_size
    }
}
