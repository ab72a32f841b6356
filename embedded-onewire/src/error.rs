/// One wire communication error type.
#[derive(Debug, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying hardware.
    Other(E),
    /// Indicates that no device answered the reset pulse.
    NoDevicePresent,
    /// The line did not float high within the retry budget; it is shorted
    /// or held low by a misbehaving slave.
    BusStuckLow,
    /// Computed CRC of a ROM or scratchpad does not match its trailing byte.
    InvalidCrc,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
