#[derive(Debug, PartialEq, Eq)]
/// nRF24L01 errors
pub enum Nrf24Error<SpiE, PinE> {
    /// SPI bus errors.
    Spi(SpiE),
    /// CE pin errors.
    Pin(PinE),
    /// The address width register did not read back as written; the radio is absent
    /// or not powered.
    NotDetected,
    /// Pipe number outside 0-5.
    InvalidPipe(u8),
    /// The head of the RX FIFO reported a dynamic payload width of 0 or above 32 bytes.
    /// The RX FIFO has been flushed.
    InvalidPayloadWidth(u8),
}
